pub mod http;
pub mod palette;

use std::collections::HashMap;

use async_trait::async_trait;
use image::RgbImage;
use tracing::{debug, warn};

use crate::core::errors::DetectionError;
use crate::models::{Detection, RawDetection};

pub use http::HttpDetector;
pub use palette::{ColorPalette, color_for, palette};

/// Raw model output: hits in model order plus the class id → label table
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub detections: Vec<RawDetection>,
    pub labels: HashMap<u32, String>,
}

impl DetectorOutput {
    pub fn label_for(&self, class_id: u32) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }
}

/// Black-box object detector
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, image: &RgbImage) -> Result<DetectorOutput, DetectionError>;

    /// Human-readable name used in logs
    fn name(&self) -> &str;
}

/// Keep detections with `confidence > threshold`, in detector order, and
/// attach the untranslated label and the palette color.
///
/// Confidences outside `[0, 1]` (NaN included) are dropped.
pub fn retain_confident(output: &DetectorOutput, threshold: f32) -> Vec<Detection> {
    let mut retained = Vec::new();

    for raw in &output.detections {
        if !(0.0..=1.0).contains(&raw.confidence) {
            warn!(
                class_id = raw.class_id,
                confidence = raw.confidence,
                "Dropping detection with invalid confidence"
            );
            continue;
        }
        if raw.confidence <= threshold {
            debug!(
                class_id = raw.class_id,
                confidence = raw.confidence,
                "Dropping detection below threshold"
            );
            continue;
        }

        let label = match output.label_for(raw.class_id) {
            Some(label) => label.to_string(),
            None => {
                warn!(class_id = raw.class_id, "Class id missing from detector label table");
                raw.class_id.to_string()
            }
        };

        retained.push(Detection {
            class_id: raw.class_id,
            label,
            confidence: raw.confidence,
            bbox: raw.bbox,
            color: color_for(raw.class_id),
        });
    }

    retained
}
