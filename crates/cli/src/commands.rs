use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};

use gondola_core::{GondolaConfig, OcrConfig, ProductVocabulary};
use gondola_ocr::{ExtractionPipeline, ExtractionResult, TextRecognizer};

/// Production pipeline: whichever OCR engine was compiled in, rxing barcodes.
type Pipeline = ExtractionPipeline<Box<dyn TextRecognizer>>;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A freshly created file may still be mid-write when its event arrives.
const SETTLE_DELAY: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per image
    Json,
    /// Indented JSON
    Pretty,
    /// Human-readable summary
    Text,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Image files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Number of images processed in parallel
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Folder searched recursively for photos
    dir: PathBuf,

    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Intake folder to watch
    dir: PathBuf,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
pub struct VocabArgs {
    /// Resolve a product name against the vocabulary (accent-insensitive)
    #[arg(long)]
    lookup: Option<String>,
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: &'a Path,
    #[serde(flatten)]
    result: &'a ExtractionResult,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn extract(args: ExtractArgs, config: &GondolaConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    run_batch(pipeline, args.files, args.jobs, args.format).await
}

pub async fn scan(args: ScanArgs, config: &GondolaConfig) -> anyhow::Result<()> {
    let files = list_images(&args.dir)
        .with_context(|| format!("listing images in {}", args.dir.display()))?;
    tracing::info!(count = files.len(), dir = %args.dir.display(), "Found images");

    let pipeline = build_pipeline(config)?;
    run_batch(pipeline, files, args.jobs, args.format).await
}

pub async fn watch(args: WatchArgs, config: &GondolaConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = gondola_ocr::spawn_intake_watcher(&args.dir, tx)
        .with_context(|| format!("watching {}", args.dir.display()))?;
    tracing::info!("Watching intake folder: {}", args.dir.display());

    loop {
        tokio::select! {
            Some(path) = rx.recv() => {
                if !is_supported_image(&path) {
                    tracing::debug!(path = %path.display(), "Ignoring non-image file");
                    continue;
                }
                tokio::time::sleep(SETTLE_DELAY).await;
                let pipeline = Arc::clone(&pipeline);
                let result = {
                    let path = path.clone();
                    tokio::task::spawn_blocking(move || pipeline.extract_file(&path)).await?
                };
                print_report(&path, &result, args.format)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watcher");
                return Ok(());
            }
        }
    }
}

pub fn vocab(args: VocabArgs, config: &GondolaConfig) -> anyhow::Result<()> {
    let vocabulary = load_vocabulary(config)?;
    match args.lookup {
        Some(name) => match vocabulary.lookup(&name) {
            Some(token) => println!("{token}"),
            None => println!("no match for {name:?}"),
        },
        None => {
            for token in vocabulary.iter() {
                println!("{token}");
            }
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_vocabulary(config: &GondolaConfig) -> anyhow::Result<Arc<ProductVocabulary>> {
    match &config.vocabulary.path {
        Some(path) => Ok(Arc::new(
            ProductVocabulary::load(path)
                .with_context(|| format!("loading vocabulary from {}", path.display()))?,
        )),
        None => Ok(ProductVocabulary::builtin()),
    }
}

fn build_pipeline(config: &GondolaConfig) -> anyhow::Result<Arc<Pipeline>> {
    let vocabulary = load_vocabulary(config)?;
    tracing::debug!(tokens = vocabulary.len(), "Vocabulary ready");
    Ok(Arc::new(ExtractionPipeline::from_config(
        build_recognizer(&config.ocr),
        vocabulary,
        config,
    )))
}

#[cfg(feature = "tesseract")]
fn build_recognizer(config: &OcrConfig) -> Box<dyn TextRecognizer> {
    use gondola_ocr::TesseractRecognizer;

    let data_path = config.tessdata_dir.as_ref().map(|p| p.display().to_string());
    Box::new(TesseractRecognizer::new(data_path, &config.language))
}

#[cfg(not(feature = "tesseract"))]
fn build_recognizer(_config: &OcrConfig) -> Box<dyn TextRecognizer> {
    tracing::warn!("Built without the `tesseract` feature; only barcodes will be read");
    Box::new(gondola_ocr::UnavailableRecognizer)
}

async fn run_batch(
    pipeline: Arc<Pipeline>,
    files: Vec<PathBuf>,
    jobs: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let permits = Arc::clone(&permits);
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let result = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || pipeline.extract_file(&path)).await?
            };
            anyhow::Ok((path, result))
        }));
    }

    // Reports come out in input order regardless of completion order.
    for handle in handles {
        let (path, result) = handle.await??;
        print_report(&path, &result, format)?;
    }
    Ok(())
}

fn print_report(path: &Path, result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<()> {
    let report = FileReport { file: path, result };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", render_text(path, result)),
    }
    Ok(())
}

fn render_text(path: &Path, result: &ExtractionResult) -> String {
    let field = |v: Option<&str>| v.unwrap_or("-").to_string();
    format!(
        "{}\n  name:    {}\n  barcode: {}\n  price:   {}\n  weight:  {}",
        path.display(),
        result.candidate().map_or_else(|| "-".to_string(), |n| n.to_string()),
        field(result.barcode.as_deref()),
        field(result.detected_price.as_deref()),
        field(result.detected_weight.as_deref()),
    )
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Every regular jpg/jpeg/png file under `dir`, sorted by path.
fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() && is_supported_image(&entry.path()) {
                found.push(entry.path());
            }
        }
    }

    found.sort();
    Ok(found)
}
