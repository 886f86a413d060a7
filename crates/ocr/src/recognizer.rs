use image::GrayImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("no OCR engine available (build with the `tesseract` feature)")]
    NotAvailable,
}

/// Abstraction over an OCR engine.
/// Implementations take the normalized grayscale bitmap and return the recognized text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        (**self).recognize(image)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string, so the extraction pipeline can be exercised
/// without Tesseract installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Stand-in when no engine is compiled in. Every call fails, so results carry
/// a diagnostic in `raw_text` plus whatever the barcode stage found.
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrError, TextRecognizer};
    use crate::preprocess::encode_png;
    use image::GrayImage;
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
            let png = encode_png(image).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            // LepTess is not Sync; one instance per call keeps the recognizer shareable.
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn blank() -> GrayImage {
        ImageBuffer::from_fn(2, 2, |_, _| Luma([255u8]))
    }

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("ARROZ TIO JOAO\nR$ 10,90\n5kg");
        assert_eq!(r.recognize(&blank()).unwrap(), "ARROZ TIO JOAO\nR$ 10,90\n5kg");
    }

    #[test]
    fn unavailable_always_fails() {
        let err = UnavailableRecognizer.recognize(&blank()).unwrap_err();
        assert!(matches!(err, OcrError::NotAvailable));
        assert!(err.to_string().contains("tesseract"));
    }
}
