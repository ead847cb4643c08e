pub mod core;
pub mod detection;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod rendering;
pub mod source;
pub mod text;
pub mod translation;

pub use crate::core::{Config, PipelineError};
pub use models::{
    BoundingBox, Color, Detection, Language, OcrSpan, PipelineResult, RawDetection,
    SpellingError, TextSample,
};
pub use pipeline::{DebugConfig, Pipeline, Stage};
