use std::fmt;
use std::sync::{Arc, OnceLock};

use gondola_core::{MatchingConfig, ProductVocabulary};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::distance::levenshtein_distance;

/// Largest edit distance still accepted as a vocabulary hit.
pub const DEFAULT_MAX_DISTANCE: usize = 2;
/// Minimum length, in characters, of a scored word or a candidate line.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_currency_digit, r"R\$\s*[0-9]");
re!(re_two_decimals, r"[0-9]+[.,][0-9]{2}");
re!(re_pure_number, r"^[0-9]+[.,]?[0-9]*$");

/// How a candidate product name was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameOrigin {
    /// A word on the line was within the distance threshold of `token`.
    Fuzzy { token: String, distance: usize },
    /// No vocabulary hit; first plausible text line.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductName {
    pub text: String,
    pub origin: NameOrigin,
}

impl ProductName {
    pub fn is_fuzzy(&self) -> bool {
        matches!(self.origin, NameOrigin::Fuzzy { .. })
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            NameOrigin::Fuzzy { .. } => write!(f, "{} (fuzzy match)", self.text),
            NameOrigin::Fallback => write!(f, "{}", self.text),
        }
    }
}

/// Best line seen so far while scoring.
struct MatchCandidate<'v> {
    line: String,
    token: &'v str,
    distance: usize,
}

/// Picks a product name out of OCR text by edit distance against a vocabulary.
#[derive(Debug, Clone)]
pub struct ProductMatcher {
    vocabulary: Arc<ProductVocabulary>,
    pub max_distance: usize,
    pub min_token_len: usize,
}

impl ProductMatcher {
    pub fn new(vocabulary: Arc<ProductVocabulary>) -> Self {
        Self {
            vocabulary,
            max_distance: DEFAULT_MAX_DISTANCE,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
        }
    }

    pub fn with_config(vocabulary: Arc<ProductVocabulary>, config: &MatchingConfig) -> Self {
        Self {
            vocabulary,
            max_distance: config.max_distance,
            min_token_len: config.min_token_len,
        }
    }

    /// Matcher over the built-in grocery vocabulary with default thresholds.
    pub fn builtin() -> Self {
        Self::new(ProductVocabulary::builtin())
    }

    pub fn vocabulary(&self) -> &ProductVocabulary {
        &self.vocabulary
    }

    /// Choose a candidate product name for `text`.
    ///
    /// The fuzzy path wins when the global minimum distance is within
    /// `max_distance`; otherwise the first plausible line is returned.
    pub fn identify(&self, text: &str) -> Option<ProductName> {
        match self.best_candidate(text) {
            Some(c) if c.distance <= self.max_distance => {
                tracing::debug!(line = %c.line, token = c.token, distance = c.distance, "Fuzzy product hit");
                Some(ProductName {
                    text: c.line,
                    origin: NameOrigin::Fuzzy { token: c.token.to_string(), distance: c.distance },
                })
            }
            _ => self.fallback_line(text).map(|line| ProductName {
                text: line.to_string(),
                origin: NameOrigin::Fallback,
            }),
        }
    }

    // Only a strictly smaller distance replaces the current best, so the first
    // line reaching the minimum is kept. The whole line is retained because
    // neighbouring words (usually the brand) belong to the name.
    fn best_candidate(&self, text: &str) -> Option<MatchCandidate<'_>> {
        let mut best: Option<MatchCandidate<'_>> = None;

        for line in text.lines() {
            let line = line.trim().to_uppercase();
            if line.chars().count() < self.min_token_len || is_price_like(&line) {
                continue;
            }

            for word in line
                .split_whitespace()
                .filter(|w| w.chars().count() >= self.min_token_len)
            {
                for token in self.vocabulary.iter() {
                    let distance = levenshtein_distance(word, token);
                    if best.as_ref().map_or(true, |b| distance < b.distance) {
                        best = Some(MatchCandidate { line: line.clone(), token, distance });
                    }
                }
            }
        }

        best
    }

    fn fallback_line<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.lines().map(str::trim).find(|l| {
            l.chars().count() > self.min_token_len
                && !re_currency_digit().is_match(l)
                && !re_pure_number().is_match(l)
        })
    }
}

fn is_price_like(line: &str) -> bool {
    re_currency_digit().is_match(line) || re_two_decimals().is_match(line)
}
