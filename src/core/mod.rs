pub mod config;
pub mod errors;

pub use config::Config;
pub use errors::{
    ConfigError, DetectionError, MetadataError, OcrError, PipelineError, RenderError, SourceError,
    SpellCheckError, TranslationError,
};
