use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::text::fold_token;

/// Grocery tokens the matcher knows out of the box.
pub const BUILTIN_TOKENS: &[&str] = &[
    "ARROZ", "FEIJAO", "MACARRAO", "OLEO", "AZEITE", "LEITE", "CAFE", "ACUCAR",
    "SAL", "FARINHA", "BISCOITO", "BOLACHA", "SABAO", "DETERGENTE", "AMACIANTE",
    "DESINFETANTE", "SHAMPOO", "CONDICIONADOR", "SABONETE", "PASTA DENTAL",
    "REFRIGERANTE", "SUCO", "AGUA", "CERVEJA", "VODKA", "WHISKY", "VINHO",
    "CARNE", "FRANGO", "PEIXE", "OVO", "QUEIJO", "PRESUNTO", "IOURTE", "MANTEIGA",
];

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Vocabulary is empty")]
    Empty,
}

/// Ordered, read-only list of canonical upper-case product tokens.
///
/// Built once at startup and shared by reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVocabulary {
    tokens: Vec<String>,
}

impl ProductVocabulary {
    /// Build from arbitrary tokens. Each one is trimmed, accent-folded and
    /// upper-cased; blanks are skipped and duplicates keep their first position.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokens
            .into_iter()
            .map(|t| fold_token(t.as_ref()))
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();

        if tokens.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(Self { tokens })
    }

    /// Parse a vocabulary file: one token per line, `#` starts a comment line.
    pub fn parse(content: &str) -> Result<Self, VocabularyError> {
        Self::from_tokens(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.starts_with('#')),
        )
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path)?;
        let vocabulary = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            tokens = vocabulary.len(),
            "Loaded product vocabulary"
        );
        Ok(vocabulary)
    }

    /// Process-wide built-in vocabulary, initialised on first access.
    /// Every caller gets a handle to the same allocation.
    pub fn builtin() -> Arc<ProductVocabulary> {
        static BUILTIN: OnceLock<Arc<ProductVocabulary>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| {
            Arc::new(Self {
                tokens: BUILTIN_TOKENS.iter().map(|t| t.to_string()).collect(),
            })
        }))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Accent-insensitive containment lookup of a free-form product name.
    ///
    /// Returns the first token (in vocabulary order) that contains the folded
    /// name or is contained by it, so `"açúcar refinado"` resolves to `ACUCAR`.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let needle = fold_token(name);
        if needle.is_empty() {
            return None;
        }
        self.iter()
            .find(|token| token.contains(needle.as_str()) || needle.contains(token))
    }
}
