use std::str::FromStr;

use gondola_matching::{NameOrigin, ProductName};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything pulled out of one product photo.
///
/// `raw_text` is always present. When a stage fails it carries a diagnostic
/// message instead of recognized text, and the fields that depend on that
/// stage stay unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Dot-decimal price, e.g. `"10.90"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_price: Option<String>,
    /// Weight or volume exactly as printed, e.g. `"2 Litros"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_weight: Option<String>,
    /// Product line picked from the OCR text, as plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    /// How `candidate_name` was chosen. Set exactly when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_origin: Option<NameOrigin>,
}

impl ExtractionResult {
    /// A result carrying only a diagnostic message.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self { raw_text: message.into(), ..Self::default() }
    }

    /// The detected price as a decimal, for hosts that store amounts.
    pub fn price_value(&self) -> Option<Decimal> {
        Decimal::from_str(self.detected_price.as_deref()?).ok()
    }

    /// Name and origin back together, for display.
    pub fn candidate(&self) -> Option<ProductName> {
        Some(ProductName {
            text: self.candidate_name.clone()?,
            origin: self.candidate_origin.clone()?,
        })
    }

    pub(crate) fn set_candidate(&mut self, name: Option<ProductName>) {
        (self.candidate_name, self.candidate_origin) = name.map(|n| (n.text, n.origin)).unzip();
    }
}
