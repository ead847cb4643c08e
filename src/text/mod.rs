//! Text side of the pipeline: OCR, script classification and spell correction.

pub mod language;
pub mod ocr;
pub mod speller;
pub mod yandex;

pub use language::classify;
pub use ocr::{OcrsExtractor, TextExtractor};
pub use speller::{SpellChecker, SpellRouter};
pub use yandex::YandexSpeller;
