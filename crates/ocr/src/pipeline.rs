use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gondola_core::{GondolaConfig, ProductVocabulary};
use gondola_matching::ProductMatcher;
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::barcode::{BarcodeReader, RxingBarcodeReader};
use crate::extract::Extractor;
use crate::hash;
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrError, TextRecognizer};
use crate::types::ExtractionResult;

/// Failures that end up as the `raw_text` diagnostic.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error: image file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Error: could not read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error: could not process image: {0}")]
    Decode(#[from] PreprocessError),
    #[error("Error: text recognition failed: {0}")]
    Recognizer(#[from] OcrError),
}

/// Orchestrates: decode → barcode → grayscale → OCR → field scan → product match.
///
/// Never fails: every problem degrades to a (possibly partial) [`ExtractionResult`].
/// Holds no per-call state, so one instance can serve concurrent callers.
pub struct ExtractionPipeline<R: TextRecognizer, B: BarcodeReader = RxingBarcodeReader> {
    recognizer: R,
    barcode_reader: B,
    matcher: ProductMatcher,
    stretch_contrast: bool,
}

impl<R: TextRecognizer> ExtractionPipeline<R, RxingBarcodeReader> {
    /// Production wiring: rxing barcodes, matcher thresholds and contrast from config.
    pub fn from_config(
        recognizer: R,
        vocabulary: Arc<ProductVocabulary>,
        config: &GondolaConfig,
    ) -> Self {
        Self::new(
            recognizer,
            RxingBarcodeReader::new(config.barcode.try_harder),
            ProductMatcher::with_config(vocabulary, &config.matching),
        )
        .with_contrast_stretch(config.ocr.stretch_contrast)
    }
}

impl<R: TextRecognizer, B: BarcodeReader> ExtractionPipeline<R, B> {
    pub fn new(recognizer: R, barcode_reader: B, matcher: ProductMatcher) -> Self {
        Self { recognizer, barcode_reader, matcher, stretch_contrast: false }
    }

    pub fn with_contrast_stretch(mut self, enabled: bool) -> Self {
        self.stretch_contrast = enabled;
        self
    }

    pub fn matcher(&self) -> &ProductMatcher {
        &self.matcher
    }

    /// Read one image from disk and extract from it.
    pub fn extract_file(&self, path: &Path) -> ExtractionResult {
        match std::fs::read(path) {
            Ok(bytes) => self.extract_bytes(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fail(PipelineError::NotFound(path.to_path_buf()))
            }
            Err(e) => fail(PipelineError::Io(e)),
        }
    }

    /// Extract from raw image bytes (JPEG / PNG / …).
    pub fn extract_bytes(&self, data: &[u8]) -> ExtractionResult {
        let span = tracing::info_span!("extract", image = %hash::short_digest(data));
        let _enter = span.enter();

        // 1. Decode. Nothing useful can happen without a bitmap.
        let image = match preprocess::decode_image(data) {
            Ok(img) => img,
            Err(e) => return fail(PipelineError::Decode(e)),
        };

        // 2. Barcode, best effort.
        let barcode = self.read_barcode(&image);

        // 3. Grayscale for the recognizer.
        let gray = preprocess::normalize(&image, self.stretch_contrast);
        drop(image);

        // 4. OCR. A failure is recorded and the remaining stages see no text.
        let recognized = panic::catch_unwind(AssertUnwindSafe(|| self.recognizer.recognize(&gray)))
            .unwrap_or_else(|_| Err(OcrError::Engine("recognizer panicked".to_string())));
        let (raw_text, text) = match recognized {
            Ok(text) => (text.clone(), text),
            Err(e) => {
                let err = PipelineError::Recognizer(e);
                tracing::warn!(error = %err, "OCR failed; continuing without text");
                (err.to_string(), String::new())
            }
        };

        // 5. Field scan and product identification.
        let fields = Extractor::extract(&text);
        let candidate_name = self.matcher.identify(&text);

        tracing::info!(
            barcode = ?barcode,
            price = ?fields.price,
            weight = ?fields.weight,
            name = ?candidate_name.as_ref().map(|n| n.text.as_str()),
            "Extraction complete"
        );

        let mut result = ExtractionResult {
            raw_text,
            barcode,
            detected_price: fields.price,
            detected_weight: fields.weight,
            ..ExtractionResult::default()
        };
        result.set_candidate(candidate_name);
        result
    }

    fn read_barcode(&self, image: &DynamicImage) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.barcode_reader.decode(image))) {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Barcode decoding failed");
                None
            }
            Err(_) => {
                tracing::warn!("Barcode engine panicked");
                None
            }
        }
    }
}

fn fail(err: PipelineError) -> ExtractionResult {
    tracing::warn!(error = %err, "Extraction aborted");
    ExtractionResult::diagnostic(err.to_string())
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends new file paths to `tx`.
/// Returns the watcher — it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("Intake queue full or closed; dropping file event");
                    }
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::tests::ean13_image;
    use crate::barcode::{BarcodeError, MockBarcodeReader};
    use crate::recognizer::{MockRecognizer, UnavailableRecognizer};
    use gondola_matching::NameOrigin;
    use image::{GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;

    const LABEL: &str = "ARR0Z TIO JOAO\nTipo 1\nARROZ 5kg especial\nTotal R$ 10,90 unidade";

    struct FailingBarcodeReader;

    impl BarcodeReader for FailingBarcodeReader {
        fn decode(&self, _image: &DynamicImage) -> Result<Option<String>, BarcodeError> {
            Err(BarcodeError::Engine("checksum mismatch".into()))
        }
    }

    struct PanickingRecognizer;

    impl TextRecognizer for PanickingRecognizer {
        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            panic!("engine blew up")
        }
    }

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        png(DynamicImage::ImageLuma8(img))
    }

    fn pipeline<R: TextRecognizer, B: BarcodeReader>(recognizer: R, reader: B) -> ExtractionPipeline<R, B> {
        ExtractionPipeline::new(recognizer, reader, ProductMatcher::builtin())
    }

    fn assert_only_diagnostic(r: &ExtractionResult) {
        assert!(r.raw_text.starts_with("Error:"), "raw_text was {:?}", r.raw_text);
        assert!(r.barcode.is_none());
        assert!(r.detected_price.is_none());
        assert!(r.detected_weight.is_none());
        assert!(r.candidate_name.is_none());
        assert!(r.candidate_origin.is_none());
    }

    #[test]
    fn extract_bytes_fills_every_field() {
        let p = pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::new("7896006711117"));
        let r = p.extract_bytes(&tiny_png());

        assert_eq!(r.raw_text, LABEL);
        assert_eq!(r.barcode.as_deref(), Some("7896006711117"));
        assert_eq!(r.detected_price.as_deref(), Some("10.90"));
        assert_eq!(r.detected_weight.as_deref(), Some("5kg"));
        let name = r.candidate().unwrap();
        // "ARROZ" on the third line is an exact hit and beats the OCR typo.
        assert_eq!(name.text, "ARROZ 5KG ESPECIAL");
        assert_eq!(name.origin, NameOrigin::Fuzzy { token: "ARROZ".into(), distance: 0 });
    }

    #[test]
    fn fuzzy_typo_line_is_kept_whole() {
        let p = pipeline(MockRecognizer::new("ARR0Z TIO JOAO\nR$ 21,90"), MockBarcodeReader::none());
        let name = p.extract_bytes(&tiny_png()).candidate().unwrap();
        assert_eq!(name.text, "ARR0Z TIO JOAO");
        assert!(name.is_fuzzy());
    }

    #[test]
    fn no_barcode_still_reaches_later_stages() {
        let p = pipeline(MockRecognizer::new("Garrafa 2 Litros\nR$ 7,99"), RxingBarcodeReader::default());
        let r = p.extract_bytes(&tiny_png());
        assert!(r.barcode.is_none());
        assert_eq!(r.detected_price.as_deref(), Some("7.99"));
        assert_eq!(r.detected_weight.as_deref(), Some("2 Litros"));
        assert_eq!(r.candidate_name.as_deref(), Some("Garrafa 2 Litros"));
        assert_eq!(r.candidate_origin, Some(NameOrigin::Fallback));
    }

    #[test]
    fn candidate_name_serializes_as_text() {
        let p = pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::none());
        let json = serde_json::to_value(p.extract_bytes(&tiny_png())).unwrap();
        assert_eq!(json["candidateName"], "ARROZ 5KG ESPECIAL");
        assert_eq!(json["candidateOrigin"]["kind"], "fuzzy");
        assert_eq!(json["candidateOrigin"]["distance"], 0);
    }

    #[test]
    fn real_barcode_is_decoded() {
        let p = pipeline(MockRecognizer::new("LEITE"), RxingBarcodeReader::default());
        let r = p.extract_bytes(&png(ean13_image("4006381333931")));
        assert_eq!(r.barcode.as_deref(), Some("4006381333931"));
    }

    #[test]
    fn barcode_engine_error_is_absorbed() {
        let p = pipeline(MockRecognizer::new("CAFE 500g\n12,49"), FailingBarcodeReader);
        let r = p.extract_bytes(&tiny_png());
        assert!(r.barcode.is_none());
        assert_eq!(r.detected_price.as_deref(), Some("12.49"));
        assert_eq!(r.detected_weight.as_deref(), Some("500g"));
    }

    #[test]
    fn zero_byte_image_short_circuits() {
        let p = pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::new("123"));
        assert_only_diagnostic(&p.extract_bytes(&[]));
    }

    #[test]
    fn corrupt_image_short_circuits() {
        let p = pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::new("123"));
        let r = p.extract_bytes(b"\x89PNG\r\n\x1a\nthis is not really a png");
        assert_only_diagnostic(&r);
        assert!(r.raw_text.contains("could not process image"));
    }

    #[test]
    fn missing_file_is_not_found_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::none());
        let r = p.extract_file(&dir.path().join("nope.jpg"));
        assert_only_diagnostic(&r);
        assert!(r.raw_text.contains("not found"));
    }

    #[test]
    fn extract_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        std::fs::write(&path, tiny_png()).unwrap();
        let p = pipeline(MockRecognizer::new("Sabonete 90g\nR$ 2,49"), MockBarcodeReader::none());
        let r = p.extract_file(&path);
        assert_eq!(r.detected_price.as_deref(), Some("2.49"));
        assert_eq!(r.detected_weight.as_deref(), Some("90g"));
    }

    #[test]
    fn recognizer_failure_is_recorded_and_pipeline_continues() {
        let p = pipeline(UnavailableRecognizer, MockBarcodeReader::new("7891000100103"));
        let r = p.extract_bytes(&tiny_png());
        assert!(r.raw_text.starts_with("Error: text recognition failed"));
        assert_eq!(r.barcode.as_deref(), Some("7891000100103"));
        // The diagnostic itself is never mined for fields.
        assert!(r.detected_price.is_none());
        assert!(r.detected_weight.is_none());
        assert!(r.candidate_name.is_none());
    }

    #[test]
    fn recognizer_panic_is_absorbed() {
        let p = pipeline(PanickingRecognizer, MockBarcodeReader::none());
        let r = p.extract_bytes(&tiny_png());
        assert!(r.raw_text.contains("recognizer panicked"));
        assert!(r.candidate_name.is_none());
    }

    #[test]
    fn repeated_runs_are_identical() {
        let p = pipeline(MockRecognizer::new(LABEL), RxingBarcodeReader::default());
        let data = tiny_png();
        let first = p.extract_bytes(&data);
        for _ in 0..3 {
            assert_eq!(p.extract_bytes(&data), first);
        }
    }

    #[test]
    fn concurrent_callers_share_one_pipeline() {
        let p = Arc::new(pipeline(MockRecognizer::new(LABEL), MockBarcodeReader::none()));
        let data = tiny_png();
        let expected = p.extract_bytes(&data);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| p.extract_bytes(&data))).collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn from_config_applies_matching_thresholds() {
        let mut config = GondolaConfig::default();
        config.matching.max_distance = 0;
        let p = ExtractionPipeline::from_config(
            MockRecognizer::new("arr0z tio joao"),
            ProductVocabulary::builtin(),
            &config,
        );
        let name = p.extract_bytes(&tiny_png()).candidate().unwrap();
        assert_eq!(name.origin, NameOrigin::Fallback);
        assert_eq!(name.text, "arr0z tio joao");
    }
}
