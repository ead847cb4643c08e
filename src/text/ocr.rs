use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use tracing::{debug, info};

use crate::core::errors::OcrError;
use crate::models::{BoundingBox, OcrSpan};

pub const DETECTION_MODEL: &str = "text-detection.rten";
pub const RECOGNITION_MODEL: &str = "text-recognition.rten";

/// Lines shorter than this are treated as noise
const MIN_LINE_CHARS: usize = 2;

/// Source of text spans found in an image
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &RgbImage) -> Result<Vec<OcrSpan>, OcrError>;
}

/// [`TextExtractor`] backed by the `ocrs` engine.
///
/// Recognition runs on tokio's blocking pool. The timeout bounds only the
/// wait: a timed-out recognition cannot be cancelled and keeps running
/// detached until it finishes, holding its blocking thread and its copy of
/// the image.
pub struct OcrsExtractor {
    engine: Arc<OcrEngine>,
    timeout: Duration,
}

impl OcrsExtractor {
    /// Load the detection and recognition models from `model_dir`
    pub fn from_dir(model_dir: &Path, timeout: Duration) -> Result<Self, OcrError> {
        let detection_path = model_dir.join(DETECTION_MODEL);
        let recognition_path = model_dir.join(RECOGNITION_MODEL);

        if !detection_path.exists() || !recognition_path.exists() {
            return Err(models_missing(&detection_path, &recognition_path));
        }

        let detection_model =
            Model::load_file(&detection_path).map_err(|e| OcrError::Engine(e.to_string()))?;
        let recognition_model =
            Model::load_file(&recognition_path).map_err(|e| OcrError::Engine(e.to_string()))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| OcrError::Engine(e.to_string()))?;

        info!(dir = %model_dir.display(), "OCR models loaded");
        Ok(Self {
            engine: Arc::new(engine),
            timeout,
        })
    }
}

#[async_trait]
impl TextExtractor for OcrsExtractor {
    async fn extract(&self, image: &RgbImage) -> Result<Vec<OcrSpan>, OcrError> {
        let engine = Arc::clone(&self.engine);
        let image = image.clone();

        let spans = run_blocking(self.timeout, move || recognize_lines(&engine, &image)).await?;

        debug!(count = spans.len(), "OCR finished");
        Ok(spans)
    }
}

/// Run `work` on the blocking pool and wait at most `timeout` for it.
///
/// Dropping the `JoinHandle` on timeout detaches the task; it is not aborted.
async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, OcrError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, OcrError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| OcrError::Timeout(timeout))?
        .map_err(|e| OcrError::Engine(e.to_string()))?
}

fn recognize_lines(engine: &OcrEngine, image: &RgbImage) -> Result<Vec<OcrSpan>, OcrError> {
    let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .map_err(|e| OcrError::Engine(e.to_string()))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| OcrError::Engine(e.to_string()))?;

    let words = engine
        .detect_words(&input)
        .map_err(|e| OcrError::Engine(e.to_string()))?;
    let lines = engine.find_text_lines(&input, &words);
    let recognized = engine
        .recognize_text(&input, &lines)
        .map_err(|e| OcrError::Engine(e.to_string()))?;

    let spans = recognized
        .into_iter()
        .flatten()
        .filter_map(|line| {
            let text = line.to_string().trim().to_string();
            if text.chars().count() < MIN_LINE_CHARS {
                return None;
            }
            let rect = line.bounding_rect();
            let region = BoundingBox::new(
                rect.left() as i32,
                rect.top() as i32,
                rect.right() as i32,
                rect.bottom() as i32,
            );
            Some(OcrSpan { text, region })
        })
        .collect();

    Ok(spans)
}

fn models_missing(detection: &Path, recognition: &Path) -> OcrError {
    OcrError::ModelsMissing {
        detection: detection.display().to_string(),
        recognition: recognition.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_are_reported_with_their_paths() {
        let dir = tempfile::tempdir().unwrap();
        let err = match OcrsExtractor::from_dir(dir.path(), Duration::from_secs(1)) {
            Err(err) => err,
            Ok(_) => panic!("models should be missing"),
        };

        match err {
            OcrError::ModelsMissing {
                detection,
                recognition,
            } => {
                assert!(detection.ends_with(DETECTION_MODEL));
                assert!(recognition.ends_with(RECOGNITION_MODEL));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timed_out_recognition_keeps_running_detached() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let result = run_blocking(Duration::from_millis(10), move || {
            std::thread::sleep(Duration::from_millis(200));
            done_tx.send(()).unwrap();
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(OcrError::Timeout(t)) if t == Duration::from_millis(10)));
        // The closure still completes after the caller has given up on it
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn blocking_work_result_is_returned() {
        let result = run_blocking(Duration::from_secs(5), || Ok(vec![1, 2, 3])).await;
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
    }
}
