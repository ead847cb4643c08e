use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{DetectorOutput, ObjectDetector};
use crate::core::config::DetectionConfig;
use crate::core::errors::DetectionError;
use crate::models::{BoundingBox, RawDetection};

/// Response body of the inference server
#[derive(Debug, Deserialize)]
struct DetectResponse {
    /// Class id (as a JSON object key) → label
    names: HashMap<String, String>,
    detections: Vec<DetectionDto>,
}

#[derive(Debug, Deserialize)]
struct DetectionDto {
    class_id: u32,
    confidence: f32,
    #[serde(rename = "box")]
    bbox: [f32; 4],
}

/// Object detector served over HTTP
///
/// Each frame is posted as a PNG body; the server answers with the model's
/// label table and its raw hits in model order.
pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    image_size: u32,
    model_confidence: f32,
    agnostic_nms: bool,
}

impl HttpDetector {
    pub fn new(config: &DetectionConfig, timeout: Duration) -> Result<Self, DetectionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            image_size: config.image_size,
            model_confidence: config.model_confidence,
            agnostic_nms: config.agnostic_nms,
        })
    }

    fn encode_frame(image: &RgbImage) -> Result<Vec<u8>, DetectionError> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn detect(&self, image: &RgbImage) -> Result<DetectorOutput, DetectionError> {
        let body = Self::encode_frame(image)?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("imgsz", self.image_size.to_string()),
                ("conf", self.model_confidence.to_string()),
                ("agnostic_nms", self.agnostic_nms.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::MalformedOutput(e.to_string()))?;

        let output = into_output(parsed)?;
        debug!(count = output.detections.len(), "Detector returned hits");
        Ok(output)
    }

    fn name(&self) -> &str {
        "http-detector"
    }
}

fn into_output(response: DetectResponse) -> Result<DetectorOutput, DetectionError> {
    let mut labels = HashMap::with_capacity(response.names.len());
    for (key, label) in response.names {
        let class_id = key
            .parse::<u32>()
            .map_err(|_| DetectionError::MalformedOutput(format!("non-numeric class id '{key}'")))?;
        labels.insert(class_id, label);
    }

    let detections = response
        .detections
        .into_iter()
        .map(|dto| {
            if !(0.0..=1.0).contains(&dto.confidence) {
                return Err(DetectionError::MalformedOutput(format!(
                    "confidence {} for class {} is outside [0, 1]",
                    dto.confidence, dto.class_id
                )));
            }

            let invalid = || DetectionError::InvalidBox {
                class_id: dto.class_id,
                bbox: dto.bbox,
            };
            let [x1, y1, x2, y2] = pixel_box(dto.bbox).ok_or_else(invalid)?;
            let bbox = BoundingBox::new(x1, y1, x2, y2).ok_or_else(invalid)?;
            Ok(RawDetection {
                class_id: dto.class_id,
                confidence: dto.confidence,
                bbox,
            })
        })
        .collect::<Result<Vec<_>, DetectionError>>()?;

    Ok(DetectorOutput { detections, labels })
}

/// Truncate coordinates towards zero; `None` when a
/// coordinate is not finite or does not fit in `i32`.
fn pixel_box(coords: [f32; 4]) -> Option<[i32; 4]> {
    let mut pixels = [0i32; 4];
    for (pixel, value) in pixels.iter_mut().zip(coords) {
        if !value.is_finite() {
            return None;
        }
        let truncated = value.trunc();
        if truncated < i32::MIN as f32 || truncated >= i32::MAX as f32 {
            return None;
        }
        *pixel = truncated as i32;
    }
    Some(pixels)
}
