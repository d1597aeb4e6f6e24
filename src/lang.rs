use lingua::LanguageDetectorBuilder;
use serde::{Deserialize, Serialize};

use crate::dataset::is_supported;

// classifier output meaning "could not determine a language"
pub static UNDETERMINED: &str = "und";

static FALLBACK_CODE: &str = "en";

pub static DEFAULT_MIN_TEXT_LEN: usize = 10;
pub static MIN_SUBJECT_LEN: usize = 5;
pub static DEFAULT_SUBJECT_WEIGHT: f64 = 0.3;
pub static DEFAULT_CANDIDATE_LIMIT: usize = 5;

// confidence for a single detection is the top score over the top 5 scores
static CONFIDENCE_WINDOW: usize = 5;
// below this the subject and body are one weak signal, not two
static COMBINED_DIRECT_THRESHOLD: usize = 50;
static BODY_TRUST_THRESHOLD: f64 = 0.7;
static MIN_SEGMENT_LEN: usize = 3;

/// Ranked language guesses for a piece of text: 3-letter codes with scores
/// that are non-negative, descending, and only comparable within one call.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str, min_segment_length: usize) -> Vec<(String, f64)>;
}

pub struct LinguaClassifier {
    detector: lingua::LanguageDetector,
}

impl LinguaClassifier {
    pub fn new() -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_all_languages()
                .with_preloaded_language_models()
                .build(),
        }
    }
}

impl Default for LinguaClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for LinguaClassifier {
    fn classify(&self, text: &str, min_segment_length: usize) -> Vec<(String, f64)> {
        let text = text.trim();
        if text.chars().count() < min_segment_length {
            return Vec::new();
        }
        self.detector
            .compute_language_confidence_values(text)
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(lang, score)| (lang.iso_code_639_3().to_string(), score))
            .collect()
    }
}

// the supported set plus common languages a classifier may report; anything
// else is truncated to its first two characters as a best effort
fn map_code3(code3: &str) -> Option<&'static str> {
    let code2 = match code3 {
        "eng" => "en",
        "spa" => "es",
        "fra" | "fre" => "fr",
        "deu" | "ger" => "de",
        "ita" => "it",
        "por" => "pt",
        "nld" | "dut" => "nl",
        "pol" => "pl",
        "rus" => "ru",
        "cmn" | "zho" => "zh",
        "jpn" => "ja",
        "kor" => "ko",
        "ara" | "arb" => "ar",
        "hin" => "hi",
        "ben" => "bn",
        "tur" => "tr",
        "vie" => "vi",
        "ukr" => "uk",
        "ces" | "cze" => "cs",
        "swe" => "sv",
        "dan" => "da",
        "fin" => "fi",
        "nob" | "nno" | "nor" => "no",
        "ron" | "rum" => "ro",
        "ell" | "gre" => "el",
        "heb" => "he",
        "ind" => "id",
        "tha" => "th",
        "hun" => "hu",
        "cat" => "ca",
        _ => return None,
    };
    Some(code2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionResult {
    pub code: String,
    pub confidence: f64,
    pub is_supported: bool,
    pub raw_code: String, // the original classifier code, kept for diagnostics
}

impl LanguageDetectionResult {
    // the deliberate low-confidence default for uninformative text
    fn undetermined() -> Self {
        Self {
            code: FALLBACK_CODE.to_string(),
            confidence: 0.0,
            is_supported: true,
            raw_code: UNDETERMINED.to_string(),
        }
    }

    fn from_candidate(code3: &str, confidence: f64) -> Self {
        let mapped = match map_code3(code3) {
            Some(code2) => code2.to_string(),
            None => code3.chars().take(2).collect(),
        };
        let supported = is_supported(&mapped);
        Self {
            code: if supported {
                mapped
            } else {
                FALLBACK_CODE.to_string()
            },
            confidence,
            is_supported: supported,
            raw_code: code3.to_string(),
        }
    }
}

pub struct LanguageDetector {
    classifier: Box<dyn Classifier>,
}

impl LanguageDetector {
    pub fn new() -> Self {
        Self::with_classifier(Box::new(LinguaClassifier::new()))
    }

    pub fn with_classifier(classifier: Box<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn detect_language(&self, text: &str, min_length: usize) -> LanguageDetectionResult {
        let text = text.trim();
        if text.chars().count() < min_length {
            return LanguageDetectionResult::undetermined();
        }

        let candidates = self.classifier.classify(text, MIN_SEGMENT_LEN);
        match candidates.first() {
            None => LanguageDetectionResult::undetermined(),
            Some((code3, _)) if code3.as_str() == UNDETERMINED => {
                LanguageDetectionResult::undetermined()
            }
            Some((code3, top)) => {
                let confidence = normalized_confidence(*top, &candidates, CONFIDENCE_WINDOW);
                LanguageDetectionResult::from_candidate(code3, confidence)
            }
        }
    }

    // subject and body carry unequal weight; body text is the longer, more
    // reliable signal and wins ties
    pub fn detect_email_language(
        &self,
        subject: &str,
        body: &str,
        subject_weight: f64,
    ) -> LanguageDetectionResult {
        let subject_weight = subject_weight.clamp(0.0, 1.0);
        let body_weight = 1.0 - subject_weight;

        let combined = format!("{} {}", subject, body);
        let combined = combined.trim();
        if combined.chars().count() < COMBINED_DIRECT_THRESHOLD {
            return self.detect_language(combined, DEFAULT_MIN_TEXT_LEN);
        }

        let subject_res = self.detect_language(subject, MIN_SUBJECT_LEN);
        let body_res = self.detect_language(body, DEFAULT_MIN_TEXT_LEN);

        if body_res.confidence > BODY_TRUST_THRESHOLD {
            return body_res;
        }

        if subject_res.code == body_res.code {
            let confidence = subject_res.confidence.max(body_res.confidence);
            return LanguageDetectionResult {
                confidence,
                ..body_res
            };
        }

        if body_res.confidence * body_weight >= subject_res.confidence * subject_weight {
            body_res
        } else {
            subject_res
        }
    }

    // unlike detect_language, confidences here are normalized over the
    // caller's limit window, so they sum to 1 across the returned sequence
    pub fn detect_languages(&self, text: &str, limit: usize) -> Vec<LanguageDetectionResult> {
        let text = text.trim();
        if text.chars().count() < DEFAULT_MIN_TEXT_LEN {
            return vec![LanguageDetectionResult::undetermined()];
        }

        let candidates = self.classifier.classify(text, MIN_SEGMENT_LEN);
        match candidates.first() {
            None => vec![LanguageDetectionResult::undetermined()],
            Some((code3, _)) if code3.as_str() == UNDETERMINED => {
                vec![LanguageDetectionResult::undetermined()]
            }
            Some(_) => {
                let window: Vec<(String, f64)> = candidates.into_iter().take(limit).collect();
                window
                    .iter()
                    .map(|(code3, score)| {
                        let confidence = normalized_confidence(*score, &window, limit);
                        LanguageDetectionResult::from_candidate(code3, confidence)
                    })
                    .collect()
            }
        }
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn normalized_confidence(score: f64, candidates: &[(String, f64)], window: usize) -> f64 {
    let sum: f64 = candidates.iter().take(window).map(|(_, s)| s).sum();
    if sum > 0.0 {
        // already <= 1 mathematically, clamped against odd classifier output
        (score / sum).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
