use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use annotext::Pipeline;
use annotext::core::Config;
use annotext::detection::HttpDetector;
use annotext::source::ImageSource;
use annotext::text::{OcrsExtractor, SpellRouter, YandexSpeller};
use annotext::translation::{GoogleTranslator, TranslationPolicy};

#[derive(Parser)]
#[command(name = "annotext")]
#[command(about = "Annotate detected objects and record an audit trail in the image's EXIF")]
struct Cli {
    /// Local path, URL or Google Drive share link
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Where to write the annotated JPEG
    #[arg(short, long, value_name = "FILE", default_value = "annotated.jpg")]
    output: PathBuf,

    /// Keep detections scoring above this confidence
    #[arg(short = 't', long, value_name = "THRESHOLD")]
    threshold: Option<f32>,

    /// Run OCR and spell correction before detection
    #[arg(long)]
    with_text: bool,

    /// Keep untranslated labels instead of failing the run
    #[arg(long)]
    lenient_translation: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(threshold) = args.threshold {
        config.detection.confidence_threshold = threshold;
    }
    if args.lenient_translation {
        config.translation.policy = TranslationPolicy::Lenient;
    }
    if args.verbose {
        config.log_level = tracing::Level::DEBUG;
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config);

    let source = ImageSource::parse(&args.source);
    info!(%source, "Loading image");
    let image_bytes = source
        .load(config.call_timeout)
        .await
        .with_context(|| format!("Failed to load {source}"))?;

    let detector = HttpDetector::new(&config.detection, config.call_timeout)
        .context("Failed to set up detector client")?;
    let translator = GoogleTranslator::new(&config.translation.endpoint, config.call_timeout)
        .context("Failed to set up translation client")?;

    let mut pipeline = Pipeline::new(Arc::new(detector), Arc::new(translator), &config)?;

    if args.with_text {
        let extractor = OcrsExtractor::from_dir(&config.text.ocr_model_dir, config.call_timeout)
            .context("Failed to load OCR models")?;
        let speller = YandexSpeller::new(&config.text.speller_endpoint, config.call_timeout)
            .context("Failed to set up speller client")?;
        let router = SpellRouter::shared(Arc::new(speller), config.call_timeout);
        pipeline = pipeline.with_text_extraction(Arc::new(extractor), router);
    }

    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let result = pipeline.run(&image_bytes).await?;

    tokio::fs::write(&args.output, &result.annotated_image)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("\n=== Annotation Results ===");
    println!("Objects detected: {}", result.detections.len());
    for detection in &result.detections {
        println!(
            "  {} at ({}, {}) - confidence: {:.2}",
            detection.label, detection.bbox.x1, detection.bbox.y1, detection.confidence
        );
    }
    if args.with_text {
        println!("\nText spans: {}", result.text_samples.len());
        for sample in &result.text_samples {
            println!("  [{}] {} -> {}", sample.language, sample.original, sample.corrected);
        }
    }
    println!("\nSaved {}", args.output.display());

    Ok(())
}

fn init_tracing(config: &Config) {
    let level = config.log_level().to_string().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("annotext={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
