use std::sync::OnceLock;

use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Optional "R$", integer part, comma or dot, exactly two cents digits.
re!(re_price,
    r"(?:R\$\s*)?([0-9]+[.,][0-9]{2})");
// Longer units first so "Litros" is not cut down to "L".
re!(re_weight,
    r"(?i)[0-9]+(?:[.,][0-9]+)?\s*(?:litros|litro|kg|ml|g|l)");

/// Price and weight/volume tokens found in a label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub price: Option<String>,
    pub weight: Option<String>,
}

pub struct Extractor;

impl Extractor {
    /// Extract structured fields from raw OCR text.
    pub fn extract(ocr_text: &str) -> ExtractedFields {
        ExtractedFields {
            price: Self::extract_price(ocr_text),
            weight: Self::extract_weight(ocr_text),
        }
    }

    /// First price on the label, separator normalized to a dot.
    ///
    /// Line breaks are collapsed first, so a price split from its marker
    /// across lines is still found.
    pub fn extract_price(text: &str) -> Option<String> {
        let flat = text.replace(['\r', '\n'], " ");
        let c = re_price().captures(flat.trim())?;
        Some(c.get(1)?.as_str().replace(',', "."))
    }

    /// First quantity with a unit, returned exactly as printed.
    pub fn extract_weight(text: &str) -> Option<String> {
        re_weight().find(text).map(|m| m.as_str().to_string())
    }
}
