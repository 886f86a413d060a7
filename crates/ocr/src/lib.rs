pub mod barcode;
pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use barcode::{BarcodeError, BarcodeReader, MockBarcodeReader, RxingBarcodeReader};
pub use extract::{ExtractedFields, Extractor};
pub use hash::{sha256_bytes, short_digest, to_hex};
pub use pipeline::{spawn_intake_watcher, ExtractionPipeline, PipelineError};
pub use preprocess::{decode_image, encode_png, normalize, to_grayscale, PreprocessError};
pub use recognizer::{MockRecognizer, OcrError, TextRecognizer, UnavailableRecognizer};
pub use types::ExtractionResult;

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;

pub use gondola_matching::{NameOrigin, ProductName};
