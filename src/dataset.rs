use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// every resolve falls back here, so a registry without it is rejected up front
static FALLBACK_LANGUAGE: &str = "en";

// the closed set of languages this crate can produce as output; a code can be
// in this set without having a dataset registered yet
pub static SUPPORTED_LANGUAGES: [&str; 9] = ["en", "es", "fr", "de", "it", "pt", "nl", "pl", "ru"];

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&normalize(code).as_str())
}

// the sole cache and lookup key
pub fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamCategory {
    Phishing,
    Scam,
    Pharma,
    Adult,
    Gambling,
    Finance,
    Urgency,
    Marketing,
    Malware,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SpamWord {
    #[validate(length(min = 1))]
    pub word: String,
    #[validate(range(min = 0.0))]
    pub score: f64,
    pub category: SpamCategory,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SubjectPattern {
    // uncompiled regular expression text, compiled by the consumer
    #[validate(length(min = 1))]
    pub pattern: String,
    #[validate(range(min = 0.0))]
    pub score: f64,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct TokenProbability {
    #[validate(range(min = 0.0, max = 1.0))]
    pub spam: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub ham: f64,
}

// the registration shape consumers supply, validated once at construction so
// that materialization can never fail afterwards
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RawLanguageDataset {
    #[validate(length(min = 2, max = 8))]
    pub language: String,
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    #[validate]
    pub spam_words: Vec<SpamWord>,
    #[serde(default)]
    #[validate(custom = "validate_weights")]
    pub spam_single_words: HashMap<String, f64>,
    #[serde(default)]
    #[validate(custom = "validate_weights")]
    pub ham_words: HashMap<String, f64>,
    #[serde(default)]
    #[validate]
    pub spam_subject_patterns: Vec<SubjectPattern>,
    #[serde(default)]
    #[validate(custom = "validate_bayesian_tokens")]
    pub bayesian_tokens: HashMap<String, TokenProbability>,
    #[serde(default)]
    pub urgency_words: Vec<String>,
    #[serde(default)]
    pub greeting_words: Vec<String>,
    #[serde(default)]
    pub generic_greetings: Vec<String>,
}

fn validate_weights(map: &HashMap<String, f64>) -> Result<(), ValidationError> {
    for (token, weight) in map {
        if token.trim().is_empty() {
            return Err(ValidationError::new("empty token"));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ValidationError::new("weight must be a non-negative number"));
        }
    }
    Ok(())
}

fn validate_bayesian_tokens(map: &HashMap<String, TokenProbability>) -> Result<(), ValidationError> {
    for (token, p) in map {
        if token.trim().is_empty() {
            return Err(ValidationError::new("empty token"));
        }
        if !(0.0..=1.0).contains(&p.spam) || !(0.0..=1.0).contains(&p.ham) {
            return Err(ValidationError::new("probability out of [0, 1]"));
        }
    }
    Ok(())
}

impl RawLanguageDataset {
    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let raw: Self = serde_json::from_str(data)?;
        Ok(raw)
    }

    fn materialize(&self) -> LanguageDataset {
        let language = normalize(&self.language);
        let language_name = if self.language_name.is_empty() {
            match isolang::Language::from_639_1(&language) {
                Some(lg) => lg.to_name().to_string(),
                None => language.clone(),
            }
        } else {
            self.language_name.clone()
        };

        LanguageDataset {
            language,
            language_name,
            spam_words: self.spam_words.clone(),
            spam_single_words: self.spam_single_words.clone(),
            ham_words: self.ham_words.clone(),
            spam_subject_patterns: self.spam_subject_patterns.clone(),
            bayesian_tokens: self.bayesian_tokens.clone(),
            urgency_words: self.urgency_words.clone(),
            greeting_words: self.greeting_words.clone(),
            generic_greetings: self.generic_greetings.clone(),
        }
    }
}

// immutable once materialized, shared as Arc across concurrent callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageDataset {
    pub language: String,
    pub language_name: String,
    pub spam_words: Vec<SpamWord>,
    pub spam_single_words: HashMap<String, f64>,
    pub ham_words: HashMap<String, f64>,
    pub spam_subject_patterns: Vec<SubjectPattern>,
    pub bayesian_tokens: HashMap<String, TokenProbability>,
    pub urgency_words: Vec<String>,
    pub greeting_words: Vec<String>,
    pub generic_greetings: Vec<String>,
}

pub struct DatasetResolver {
    registry: Vec<RawLanguageDataset>, // registration order preserved
    cache: RwLock<HashMap<String, Arc<LanguageDataset>>>,
}

impl DatasetResolver {
    pub fn new(datasets: Vec<RawLanguageDataset>) -> anyhow::Result<Self> {
        let mut registry: Vec<RawLanguageDataset> = Vec::with_capacity(datasets.len());
        for mut raw in datasets {
            raw.validate()
                .map_err(|err| anyhow::anyhow!("invalid dataset {:?}: {}", raw.language, err))?;
            raw.language = normalize(&raw.language);
            if registry.iter().any(|r| r.language == raw.language) {
                anyhow::bail!("duplicate dataset for language {:?}", raw.language);
            }
            registry.push(raw);
        }

        if !registry.iter().any(|r| r.language == FALLBACK_LANGUAGE) {
            anyhow::bail!("fallback language {:?} must be registered", FALLBACK_LANGUAGE);
        }

        Ok(Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        })
    }

    // total for any string input: unregistered codes fall back to English,
    // which the constructor guarantees is registered
    pub fn resolve(&self, code: &str) -> Arc<LanguageDataset> {
        let key = normalize(code);
        if let Some(ds) = self.cached(&key) {
            return ds;
        }

        if let Some(raw) = self.registry.iter().find(|r| r.language == key) {
            return self.materialize_into_cache(raw);
        }

        if key != FALLBACK_LANGUAGE {
            log::warn!(
                "no dataset registered for language {:?}, falling back to {:?}",
                key,
                FALLBACK_LANGUAGE
            );
        }
        self.resolve(FALLBACK_LANGUAGE)
    }

    fn cached(&self, key: &str) -> Option<Arc<LanguageDataset>> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    fn materialize_into_cache(&self, raw: &RawLanguageDataset) -> Arc<LanguageDataset> {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // re-check under the write lock, first writer wins
        if let Some(ds) = cache.get(&raw.language) {
            return ds.clone();
        }
        let ds = Arc::new(raw.materialize());
        cache.insert(raw.language.clone(), ds.clone());
        ds
    }

    pub fn is_available(&self, code: &str) -> bool {
        let key = normalize(code);
        self.registry.iter().any(|r| r.language == key)
    }

    pub fn list_available(&self) -> Vec<String> {
        self.registry.iter().map(|r| r.language.clone()).collect()
    }

    pub fn list_supported(&self) -> Vec<String> {
        SUPPORTED_LANGUAGES.iter().map(|c| c.to_string()).collect()
    }

    pub fn preload_all(&self) {
        for raw in &self.registry {
            if self.cached(&raw.language).is_none() {
                self.materialize_into_cache(raw);
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn spam_words(&self, code: &str) -> Vec<SpamWord> {
        self.resolve(code).spam_words.clone()
    }

    pub fn ham_words(&self, code: &str) -> HashMap<String, f64> {
        self.resolve(code).ham_words.clone()
    }

    pub fn bayesian_tokens(&self, code: &str) -> HashMap<String, TokenProbability> {
        self.resolve(code).bayesian_tokens.clone()
    }

    pub fn urgency_words(&self, code: &str) -> Vec<String> {
        self.resolve(code).urgency_words.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_raw() -> RawLanguageDataset {
        RawLanguageDataset::from_json(
            r#"{
            "language": "en",
            "spam_words": [
                {"word": "free money", "score": 5.0, "category": "scam"},
                {"word": "VIAGRA", "score": 8.0, "category": "pharma", "case_sensitive": true}
            ],
            "spam_single_words": {"winner": 3.0, "prize": 2.5},
            "ham_words": {"meeting": 1.5, "invoice": 1.0},
            "spam_subject_patterns": [
                {"pattern": "^re:\\s*$", "score": 2.0, "name": "empty reply"}
            ],
            "bayesian_tokens": {"lottery": {"spam": 0.95, "ham": 0.02}},
            "urgency_words": ["immediately", "urgent"],
            "greeting_words": ["hello", "hi"],
            "generic_greetings": ["dear customer", "dear friend"]
        }"#,
        )
        .unwrap()
    }

    fn spanish_raw() -> RawLanguageDataset {
        RawLanguageDataset {
            language: "es".to_string(),
            spam_single_words: HashMap::from([("ganador".to_string(), 3.0)]),
            urgency_words: vec!["urgente".to_string()],
            ..Default::default()
        }
    }

    fn resolver() -> DatasetResolver {
        DatasetResolver::new(vec![english_raw(), spanish_raw()]).unwrap()
    }

    #[test]
    fn normalization_yields_identical_instance() {
        let rs = resolver();
        let a = rs.resolve(" EN ");
        let b = rs.resolve("en");
        let c = rs.resolve("En");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(a.language, "en");
        assert_eq!(a.language_name, "English");
    }

    #[test]
    fn unregistered_codes_fall_back_to_english() {
        let rs = resolver();
        let en = rs.resolve("en");
        for code in ["", "xx", "zz-unknown", "  ", "fr"] {
            let ds = rs.resolve(code);
            assert!(Arc::ptr_eq(&ds, &en), "code {:?} must fall back", code);
        }
    }

    #[test]
    fn clear_cache_rematerializes_equal_dataset() {
        let rs = resolver();
        let before = rs.resolve("en");
        rs.clear_cache();
        let after = rs.resolve("en");
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[test]
    fn constructor_rejects_bad_registries() {
        assert!(DatasetResolver::new(vec![]).is_err());
        // fallback language missing
        assert!(DatasetResolver::new(vec![spanish_raw()]).is_err());
        // duplicate code after normalization
        let mut dup = english_raw();
        dup.language = " EN ".to_string();
        assert!(DatasetResolver::new(vec![english_raw(), dup]).is_err());
        // probability out of range
        let mut bad = english_raw();
        bad.bayesian_tokens.insert(
            "broken".to_string(),
            TokenProbability {
                spam: 1.5,
                ham: 0.1,
            },
        );
        assert!(DatasetResolver::new(vec![bad]).is_err());
        // negative word weight
        let mut bad = english_raw();
        bad.ham_words.insert("broken".to_string(), -1.0);
        assert!(DatasetResolver::new(vec![bad]).is_err());
    }

    #[test]
    fn availability_is_distinct_from_support() {
        let rs = resolver();
        assert!(rs.is_available("EN"));
        assert!(rs.is_available("es"));
        assert!(!rs.is_available("fr"));
        assert_eq!(rs.list_available(), vec!["en", "es"]);
        // "fr" is supported but has no dataset registered
        assert!(rs.list_supported().contains(&"fr".to_string()));
        assert_eq!(rs.list_supported().len(), SUPPORTED_LANGUAGES.len());
    }

    #[test]
    fn preload_all_is_idempotent() {
        let rs = resolver();
        rs.preload_all();
        let en = rs.resolve("en");
        let es = rs.resolve("es");
        rs.preload_all();
        assert!(Arc::ptr_eq(&en, &rs.resolve("en")));
        assert!(Arc::ptr_eq(&es, &rs.resolve("es")));
    }

    #[test]
    fn field_accessors_project_resolved_dataset() {
        let rs = resolver();
        let en = rs.resolve("en");
        assert_eq!(rs.spam_words("en"), en.spam_words);
        assert_eq!(rs.ham_words("en"), en.ham_words);
        assert_eq!(rs.bayesian_tokens("en"), en.bayesian_tokens);
        assert_eq!(rs.urgency_words("en"), en.urgency_words);
        // projections of an unregistered code follow the fallback
        assert_eq!(rs.urgency_words("xx"), en.urgency_words);
    }

    #[test]
    fn patterns_stay_uncompiled_text() {
        let rs = resolver();
        let en = rs.resolve("en");
        assert_eq!(en.spam_subject_patterns.len(), 1);
        assert_eq!(en.spam_subject_patterns[0].pattern, "^re:\\s*$");
        assert_eq!(en.spam_subject_patterns[0].name, "empty reply");
    }

    #[test]
    fn missing_language_name_defaults_from_isolang() {
        let rs = resolver();
        assert_eq!(rs.resolve("es").language_name, "Spanish");
    }

    #[test]
    fn concurrent_resolves_observe_one_instance() {
        let rs = Arc::new(resolver());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let rs = rs.clone();
            handles.push(std::thread::spawn(move || rs.resolve("es")));
        }
        let first = rs.resolve("es");
        for h in handles {
            let ds = h.join().unwrap();
            assert!(Arc::ptr_eq(&first, &ds));
        }
    }
}
