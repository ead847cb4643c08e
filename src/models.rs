use std::fmt;

use image::Rgb;
use uuid::Uuid;

/// Axis-aligned box in pixel coordinates, corners inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box, returning `None` unless `x1 < x2` and `y1 < y2`
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    /// Inclusive width, saturating at `u32::MAX`
    pub fn width(&self) -> u32 {
        inclusive_span(self.x1, self.x2)
    }

    /// Inclusive height, saturating at `u32::MAX`
    pub fn height(&self) -> u32 {
        inclusive_span(self.y1, self.y2)
    }
}

fn inclusive_span(from: i32, to: i32) -> u32 {
    u32::try_from(i64::from(to) - i64::from(from) + 1).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Color> for Rgb<u8> {
    fn from(color: Color) -> Self {
        Rgb([color.r, color.g, color.b])
    }
}

impl From<Rgb<u8>> for Color {
    fn from(pixel: Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Color { r, g, b }
    }
}

/// One detector hit before confidence filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A retained detection: label, color and box, ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    /// Label as drawn and recorded (translated unless translation was skipped)
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub color: Color,
}

/// Script-based language of a text span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Cyrillic only
    Cyrillic,
    /// Latin only
    Latin,
    Mixed,
    Unknown,
}

impl Language {
    /// Speller language code for the primary scripts
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Language::Cyrillic => Some("ru"),
            Language::Latin => Some("en"),
            Language::Mixed | Language::Unknown => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Cyrillic => "ru",
            Language::Latin => "en",
            Language::Mixed => "mixed",
            Language::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One OCR span with its spell-corrected variant
#[derive(Debug, Clone, PartialEq)]
pub struct TextSample {
    pub id: Uuid,
    pub original: String,
    /// Equal to `original` when correction failed or found nothing
    pub corrected: String,
    pub language: Language,
}

/// A misspelled word and the replacements offered for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellingError {
    pub word: String,
    pub suggestions: Vec<String>,
}

/// A line of text found by OCR
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSpan {
    pub text: String,
    pub region: Option<BoundingBox>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// JPEG bytes carrying the annotations and the merged EXIF block
    pub annotated_image: Vec<u8>,
    pub detections: Vec<Detection>,
    pub text_samples: Vec<TextSample>,
}
