// Typed errors for every collaborator the pipeline talks to.
//
// Fatal errors surface as `PipelineError`; the recoverable ones
// (`SpellCheckError`, `MetadataError::Parse`, `TranslationError` under the
// lenient policy) are handled at their call sites and only logged.

use std::time::Duration;

use thiserror::Error;

/// Object detector errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detector request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Detector returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Malformed detector output: {0}")]
    MalformedOutput(String),

    #[error("Invalid box {bbox:?} for class {class_id}")]
    InvalidBox { class_id: u32, bbox: [f32; 4] },

    #[error("Frame encoding failed: {0}")]
    FrameEncoding(#[from] image::ImageError),

    #[error("Detector did not answer within {0:?}")]
    Timeout(Duration),
}

/// Translation service errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Translation service returned HTTP {0}")]
    BadStatus(u16),

    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),

    #[error("Translation of '{text}' timed out after {timeout:?}")]
    Timeout { text: String, timeout: Duration },
}

/// Spell-checking service errors (always recovered by the router)
#[derive(Debug, Error)]
pub enum SpellCheckError {
    #[error("Unsupported speller language: {0} (use 'ru', 'en' or 'uk')")]
    UnsupportedLanguage(String),

    #[error("Speller request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Speller returned HTTP {0}")]
    BadStatus(u16),

    #[error("Speller call timed out after {0:?}")]
    Timeout(Duration),
}

/// OCR engine errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR models not found; expected {detection} and {recognition}")]
    ModelsMissing {
        detection: String,
        recognition: String,
    },

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR did not finish within {0:?}")]
    Timeout(Duration),
}

/// EXIF container errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Existing metadata is malformed: {0}")]
    Parse(#[source] exif::Error),

    #[error("EXIF serialisation failed: {0}")]
    Serialize(#[source] exif::Error),

    #[error("EXIF block of {0} bytes does not fit in a JPEG APP1 segment")]
    TooLarge(usize),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Annotation rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Font could not be loaded: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),

    #[error("Invalid font scale: {0}")]
    InvalidScale(f32),
}

/// Image source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Download of {url} returned HTTP {status}")]
    BadStatus { url: String, status: u16 },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Fatal errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Text extraction failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Object detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Label translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Output image could not be produced: {0}")]
    MetadataEncode(#[from] MetadataError),

    #[error("Renderer setup failed: {0}")]
    Render(#[from] RenderError),

    #[error("Debug output failed: {0}")]
    Debug(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
