use std::collections::HashMap;

use image::DynamicImage;
use rxing::{DecodeHintType, DecodeHintValue, DecodingHintDictionary};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BarcodeError {
    #[error("barcode engine error: {0}")]
    Engine(String),
}

/// Abstraction over a barcode engine.
/// `Ok(None)` means no symbol was found, which is a normal outcome.
pub trait BarcodeReader: Send + Sync {
    fn decode(&self, image: &DynamicImage) -> Result<Option<String>, BarcodeError>;
}

// ── rxing backend ─────────────────────────────────────────────────────────────

/// Scans every symbology rxing supports (1D retail codes, QR, Data Matrix, …).
#[derive(Debug, Clone)]
pub struct RxingBarcodeReader {
    /// Slower exhaustive search that tolerates rotation, skew and low contrast.
    pub try_harder: bool,
}

impl Default for RxingBarcodeReader {
    fn default() -> Self {
        Self { try_harder: true }
    }
}

impl RxingBarcodeReader {
    pub fn new(try_harder: bool) -> Self {
        Self { try_harder }
    }
}

impl BarcodeReader for RxingBarcodeReader {
    fn decode(&self, image: &DynamicImage) -> Result<Option<String>, BarcodeError> {
        let luma = image.to_luma8();
        let (width, height) = luma.dimensions();

        let mut hints: DecodingHintDictionary = HashMap::new();
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(self.try_harder));

        // No format restriction: rxing tries all of its readers.
        match rxing::helpers::detect_in_luma_with_hints(luma.into_raw(), width, height, None, &mut hints) {
            Ok(result) => Ok(Some(result.getText().to_string())),
            Err(e) => {
                // rxing reports "nothing found" through the same error channel.
                tracing::debug!(error = %e, "No barcode decoded");
                Ok(None)
            }
        }
    }
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Returns a pre-set payload regardless of the image.
#[derive(Debug, Clone, Default)]
pub struct MockBarcodeReader {
    pub payload: Option<String>,
}

impl MockBarcodeReader {
    pub fn new(payload: impl Into<String>) -> Self {
        Self { payload: Some(payload.into()) }
    }

    pub fn none() -> Self {
        Self { payload: None }
    }
}

impl BarcodeReader for MockBarcodeReader {
    fn decode(&self, _image: &DynamicImage) -> Result<Option<String>, BarcodeError> {
        Ok(self.payload.clone())
    }
}
