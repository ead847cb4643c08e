mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from annotext for tests
pub use annotext::core::{Config, DetectionError, OcrError, SpellCheckError, TranslationError};
pub use annotext::detection::{DetectorOutput, ObjectDetector, color_for};
pub use annotext::metadata::{MetadataContainer, Segment};
pub use annotext::models::{BoundingBox, OcrSpan, RawDetection, SpellingError};
pub use annotext::text::{SpellChecker, SpellRouter, TextExtractor};
pub use annotext::translation::{TranslationPolicy, Translator};
pub use annotext::{Pipeline, PipelineError};
