use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::RgbImage;
use tracing::{Level, debug, info};

use crate::core::Config;
use crate::core::errors::{DetectionError, PipelineError, Result};
use crate::detection::{ObjectDetector, retain_confident};
use crate::metadata::{self, AuditTrail, MetadataContainer};
use crate::models::{Detection, PipelineResult, TextSample};
use crate::rendering::AnnotationRenderer;
use crate::text::{SpellRouter, TextExtractor};
use crate::translation::{LabelTranslator, Translator};

/// Stages of one run, in order; `Failed` is reachable from any fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    TextExtracted,
    Detected,
    Translated,
    Annotated,
    MetadataEmbedded,
    Done,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::TextExtracted => "text_extracted",
            Stage::Detected => "detected",
            Stage::Translated => "translated",
            Stage::Annotated => "annotated",
            Stage::MetadataEmbedded => "metadata_embedded",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory; run `n` writes `run_<n>/00_input.png` and
    /// `run_<n>/01_annotated.png`, numbered from 01
    pub output_dir: PathBuf,
}

impl DebugConfig {
    pub fn run_dir(&self, run: usize) -> PathBuf {
        self.output_dir.join(format!("run_{run:02}"))
    }
}

/// OCR plus spell correction, run before detection when configured
struct TextStage {
    extractor: Arc<dyn TextExtractor>,
    router: SpellRouter,
}

/// Annotation pipeline.
///
/// Holds only read-only state after construction, apart from the debug run
/// counter, so one instance can serve concurrent runs.
pub struct Pipeline {
    detector: Arc<dyn ObjectDetector>,
    translator: LabelTranslator,
    renderer: AnnotationRenderer,
    text: Option<TextStage>,
    debug: Option<DebugConfig>,
    confidence_threshold: f32,
    call_timeout: Duration,
    jpeg_quality: u8,
    runs: AtomicUsize,
}

impl Pipeline {
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        translator: Arc<dyn Translator>,
        config: &Config,
    ) -> Result<Self> {
        let translator = LabelTranslator::new(
            translator,
            config.translation.source_lang.clone(),
            config.translation.target_lang.clone(),
            config.translation.policy,
            config.call_timeout,
        );

        Ok(Self {
            detector,
            translator,
            renderer: AnnotationRenderer::new(config.rendering.font_scale)?,
            text: None,
            debug: None,
            confidence_threshold: config.confidence_threshold(),
            call_timeout: config.call_timeout,
            jpeg_quality: config.rendering.jpeg_quality,
            runs: AtomicUsize::new(0),
        })
    }

    /// Extract text with `extractor` and correct it through `router`
    pub fn with_text_extraction(
        mut self,
        extractor: Arc<dyn TextExtractor>,
        router: SpellRouter,
    ) -> Self {
        self.text = Some(TextStage { extractor, router });
        self
    }

    pub fn with_renderer(mut self, renderer: AnnotationRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir).map_err(|e| debug_error(&output_dir, e))?;
            if entries.next().is_some() {
                return Err(PipelineError::Debug(format!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(|e| debug_error(&output_dir, e))?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn debug_config(&self) -> Option<&DebugConfig> {
        self.debug.as_ref()
    }

    /// Annotate one image and embed the audit trail in its metadata
    pub async fn run(&self, image_bytes: &[u8]) -> Result<PipelineResult> {
        enter(Stage::Start);
        match self.run_stages(image_bytes).await {
            Ok(result) => {
                enter(Stage::Done);
                info!(
                    detections = result.detections.len(),
                    text_samples = result.text_samples.len(),
                    bytes = result.annotated_image.len(),
                    "Pipeline finished"
                );
                Ok(result)
            }
            Err(err) => {
                debug!(stage = %Stage::Failed, error = %err, "Pipeline stage");
                Err(err)
            }
        }
    }

    async fn run_stages(&self, image_bytes: &[u8]) -> Result<PipelineResult> {
        let image = image::load_from_memory(image_bytes)
            .map_err(PipelineError::Decode)?
            .to_rgb8();
        debug!(width = image.width(), height = image.height(), "Decoded input");
        let debug_dir = self.debug_run_dir()?;
        save_debug_image(debug_dir.as_deref(), &image, "00_input.png")?;

        let text_samples = match &self.text {
            Some(stage) => {
                let samples = self.extract_text(stage, &image).await?;
                enter(Stage::TextExtracted);
                samples
            }
            None => Vec::new(),
        };

        let detections = self.detect(&image).await?;
        enter(Stage::Detected);

        let detections = self.translator.translate_detections(detections).await?;
        enter(Stage::Translated);

        let annotated = self.renderer.render(&image, &detections);
        save_debug_image(debug_dir.as_deref(), &annotated, "01_annotated.png")?;
        enter(Stage::Annotated);

        let mut container = MetadataContainer::load(image_bytes);
        let trail = AuditTrail::new(&detections, &text_samples);
        container.set_audit_tags(&trail);
        let annotated_image = metadata::embed(&annotated, &container, self.jpeg_quality)?;
        debug!(objects = %trail.objects, tags = container.tag_count(), "Metadata embedded");
        enter(Stage::MetadataEmbedded);

        Ok(PipelineResult {
            annotated_image,
            detections,
            text_samples,
        })
    }

    async fn extract_text(&self, stage: &TextStage, image: &RgbImage) -> Result<Vec<TextSample>> {
        let spans = stage.extractor.extract(image).await?;
        info!(count = spans.len(), "Text spans extracted");

        let mut samples = Vec::with_capacity(spans.len());
        for span in &spans {
            if tracing::enabled!(Level::DEBUG) {
                for error in stage.router.list_errors(&span.text).await {
                    debug!(word = %error.word, suggestions = ?error.suggestions, "Spelling error");
                }
            }
            samples.push(stage.router.correct_sample(&span.text).await);
        }
        Ok(samples)
    }

    async fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let output = tokio::time::timeout(self.call_timeout, self.detector.detect(image))
            .await
            .map_err(|_| DetectionError::Timeout(self.call_timeout))??;

        let detections = retain_confident(&output, self.confidence_threshold);
        info!(
            detector = self.detector.name(),
            raw = output.detections.len(),
            retained = detections.len(),
            threshold = self.confidence_threshold,
            "Objects detected"
        );
        Ok(detections)
    }

    /// Fresh directory for this run's dumps, `None` outside debug mode
    fn debug_run_dir(&self) -> Result<Option<PathBuf>> {
        let Some(debug_config) = &self.debug else {
            return Ok(None);
        };

        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let dir = debug_config.run_dir(run);
        std::fs::create_dir(&dir).map_err(|e| debug_error(&dir, e))?;
        Ok(Some(dir))
    }
}

fn save_debug_image(dir: Option<&Path>, image: &RgbImage, file_name: &str) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };

    let path = dir.join(file_name);
    image
        .save(&path)
        .map_err(|e| PipelineError::Debug(format!("Failed to save {}: {e}", path.display())))?;
    debug!(path = %path.display(), "Debug image saved");
    Ok(())
}

fn enter(stage: Stage) {
    debug!(stage = %stage, "Pipeline stage");
}

fn debug_error(dir: &Path, err: std::io::Error) -> PipelineError {
    PipelineError::Debug(format!("{}: {err}", dir.display()))
}
