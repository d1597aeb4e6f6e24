//! Language detection and per-language lexical datasets for spam scoring.

pub mod conf;
pub mod dataset;
pub mod lang;

pub use dataset::{
    DatasetResolver, LanguageDataset, RawLanguageDataset, SpamCategory, SpamWord, SubjectPattern,
    TokenProbability,
};
pub use lang::{Classifier, LanguageDetectionResult, LanguageDetector, LinguaClassifier};
