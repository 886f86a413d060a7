pub mod config;
pub mod text;
pub mod vocabulary;

pub use config::{BarcodeConfig, ConfigError, GondolaConfig, MatchingConfig, OcrConfig, VocabularyConfig};
pub use text::strip_accents;
pub use vocabulary::{ProductVocabulary, VocabularyError, BUILTIN_TOKENS};
