use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use annotext::core::{DetectionError, OcrError, SpellCheckError, TranslationError};
use annotext::detection::{DetectorOutput, ObjectDetector};
use annotext::models::{BoundingBox, OcrSpan, RawDetection, SpellingError};
use annotext::text::{SpellChecker, TextExtractor};
use annotext::translation::Translator;
use async_trait::async_trait;
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageEncoder, Rgb, RgbImage};

/// Creates a flat grey test image.
pub fn create_test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |_, _| Rgb([128u8, 128u8, 128u8]))
}

/// Encodes `image` as JPEG with `exif` (TIFF bytes, no prefix) as its APP1 block.
pub fn encode_jpeg(image: &RgbImage, exif: Option<Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, 95);
    if let Some(exif) = exif {
        encoder.set_exif_metadata(exif).expect("JPEG encoder accepts EXIF");
    }
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .expect("Failed to encode test JPEG");
    out
}

/// Encodes `image` as PNG, which carries no EXIF.
pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode test PNG");
    out.into_inner()
}

/// ASCII field in the given IFD
pub fn ascii_field(tag: Tag, ifd_num: In, text: &str) -> Field {
    Field {
        tag,
        ifd_num,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

/// Serialises `fields` into a little-endian TIFF block.
pub fn exif_block(fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, true).expect("Failed to write test EXIF");
    buf.into_inner()
}

/// JPEG whose EXIF holds the four fields returned alongside it.
pub fn jpeg_with_exif(width: u32, height: u32) -> (Vec<u8>, Vec<Field>) {
    let fields = vec![
        ascii_field(Tag::Artist, In::PRIMARY, "Jane Roe"),
        ascii_field(Tag::Copyright, In::PRIMARY, "(c) 2024"),
        ascii_field(Tag::ImageDescription, In::PRIMARY, "street corner"),
        ascii_field(Tag::DateTimeOriginal, In::PRIMARY, "2024:05:01 10:00:00"),
    ];
    let bytes = encode_jpeg(&create_test_image(width, height), Some(exif_block(&fields)));
    (bytes, fields)
}

/// 1st IFD fields of a JPEG-compressed thumbnail
pub fn thumbnail_fields() -> Vec<Field> {
    vec![
        Field {
            tag: Tag::Compression,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![6]),
        },
        Field {
            tag: Tag::XResolution,
            ifd_num: In::THUMBNAIL,
            value: Value::Rational(vec![Rational { num: 72, denom: 1 }]),
        },
    ]
}

/// JPEG whose EXIF carries an `Artist` tag, the 1st IFD fields and `thumbnail`
/// as its embedded JPEG thumbnail.
pub fn jpeg_with_thumbnail(width: u32, height: u32, thumbnail: &[u8]) -> Vec<u8> {
    let mut fields = vec![ascii_field(Tag::Artist, In::PRIMARY, "Jane Roe")];
    fields.extend(thumbnail_fields());

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    writer.set_jpeg(thumbnail, In::THUMBNAIL);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, true).expect("Failed to write test EXIF");

    encode_jpeg(&create_test_image(width, height), Some(buf.into_inner()))
}

/// JPEG whose 1st IFD describes an uncompressed strip thumbnail instead of a JPEG one.
pub fn jpeg_with_strip_thumbnail(width: u32, height: u32) -> Vec<u8> {
    let fields = vec![
        ascii_field(Tag::Artist, In::PRIMARY, "Jane Roe"),
        Field {
            tag: Tag::Compression,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![1]),
        },
        Field {
            tag: Tag::ImageWidth,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![2]),
        },
        Field {
            tag: Tag::ImageLength,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![1]),
        },
    ];
    let strip: &[u8] = &[0, 0, 0, 255, 255, 255];
    let strips = [strip];

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    writer.set_strips(&strips, In::THUMBNAIL);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, true).expect("Failed to write test EXIF");

    encode_jpeg(&create_test_image(width, height), Some(buf.into_inner()))
}

/// JPEG with an APP1 "Exif" segment that does not hold a TIFF structure.
pub fn jpeg_with_malformed_exif(width: u32, height: u32) -> Vec<u8> {
    let garbage = b"this is not a tiff header at all".to_vec();
    encode_jpeg(&create_test_image(width, height), Some(garbage))
}

pub fn raw_detection(class_id: u32, confidence: f32, x1: i32, y1: i32, x2: i32, y2: i32) -> RawDetection {
    RawDetection {
        class_id,
        confidence,
        bbox: BoundingBox::new(x1, y1, x2, y2).expect("valid test box"),
    }
}

pub fn labels(entries: &[(u32, &str)]) -> HashMap<u32, String> {
    entries.iter().map(|&(id, name)| (id, name.to_string())).collect()
}

/// Detector returning a fixed output
pub struct FakeDetector {
    pub output: DetectorOutput,
    delay: Option<Duration>,
}

impl FakeDetector {
    pub fn new(detections: Vec<RawDetection>, labels: HashMap<u32, String>) -> Self {
        Self {
            output: DetectorOutput { detections, labels },
            delay: None,
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ObjectDetector for FakeDetector {
    async fn detect(&self, _image: &RgbImage) -> Result<DetectorOutput, DetectionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Detector that always fails
pub struct FailingDetector;

#[async_trait]
impl ObjectDetector for FailingDetector {
    async fn detect(&self, _image: &RgbImage) -> Result<DetectorOutput, DetectionError> {
        Err(DetectionError::MalformedOutput("model crashed".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Dictionary translator; words outside the dictionary fail
pub struct FakeTranslator {
    dictionary: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeTranslator {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            dictionary: entries
                .iter()
                .map(|&(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<String, TranslationError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.dictionary
            .get(text)
            .cloned()
            .ok_or_else(|| TranslationError::InvalidResponse(format!("no translation for {text}")))
    }
}

/// Speller correcting whole inputs from a table and recording every call
#[derive(Default)]
pub struct FakeSpeller {
    corrections: HashMap<String, String>,
    errors: HashMap<String, Vec<SpellingError>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSpeller {
    pub fn new(corrections: &[(&str, &str)]) -> Self {
        let mut speller = Self::default();
        for &(from, to) in corrections {
            speller.corrections.insert(from.to_string(), to.to_string());
            speller.errors.insert(
                from.to_string(),
                vec![SpellingError {
                    word: from.to_string(),
                    suggestions: vec![to.to_string()],
                }],
            );
        }
        speller
    }

    /// Fail every call whose text is `text`
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(text, lang)` of every call, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, text: &str, lang: &str) -> Result<(), SpellCheckError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), lang.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(text) {
            return Err(SpellCheckError::BadStatus(503));
        }
        Ok(())
    }
}

#[async_trait]
impl SpellChecker for FakeSpeller {
    async fn spelled(&self, text: &str, lang: &str) -> Result<String, SpellCheckError> {
        self.record(text, lang).await?;
        Ok(self.corrections.get(text).cloned().unwrap_or_else(|| text.to_string()))
    }

    async fn spell(&self, text: &str, lang: &str) -> Result<Vec<SpellingError>, SpellCheckError> {
        self.record(text, lang).await?;
        Ok(self.errors.get(text).cloned().unwrap_or_default())
    }
}

/// Extractor returning fixed spans
pub struct FakeExtractor {
    pub spans: Vec<String>,
}

impl FakeExtractor {
    pub fn new(spans: &[&str]) -> Self {
        Self {
            spans: spans.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _image: &RgbImage) -> Result<Vec<OcrSpan>, OcrError> {
        Ok(self
            .spans
            .iter()
            .map(|text| OcrSpan {
                text: text.clone(),
                region: None,
            })
            .collect())
    }
}
