use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration, usually read from `gondola.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GondolaConfig {
    pub matching: MatchingConfig,
    pub ocr: OcrConfig,
    pub barcode: BarcodeConfig,
    pub vocabulary: VocabularyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Largest edit distance still accepted as a vocabulary hit.
    pub max_distance: usize,
    /// Words shorter than this (in characters) are never scored.
    pub min_token_len: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { max_distance: 2, min_token_len: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    /// Directory holding `<language>.traineddata`; system default when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub stretch_contrast: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { language: "eng".to_string(), tessdata_dir: None, stretch_contrast: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    pub try_harder: bool,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self { try_harder: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Token file replacing the built-in list.
    pub path: Option<PathBuf>,
}

impl GondolaConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matching.min_token_len == 0 {
            return Err(ConfigError::Invalid(
                "matching.min_token_len must be at least 1".to_string(),
            ));
        }
        if self.ocr.language.trim().is_empty() {
            return Err(ConfigError::Invalid("ocr.language cannot be empty".to_string()));
        }
        Ok(())
    }
}
