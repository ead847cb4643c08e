//! EXIF load, merge and re-encode.
//!
//! The container is read from the original (pre-annotation) bytes, the three
//! audit tags are overwritten, and the annotated pixels are JPEG-encoded with
//! the merged block as their APP1 segment. Every other tag is carried over
//! untouched.

use std::collections::BTreeMap;
use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Exif, Field, In, Reader, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, ImageError, RgbImage};
use tracing::{debug, warn};

use crate::core::errors::MetadataError;
use crate::models::{Detection, TextSample};

/// Detected-object list (0th IFD `Make`)
pub const OBJECTS_TAG: Tag = Tag::Make;
/// Original OCR text list (0th IFD `Model`)
pub const ORIGINAL_TEXT_TAG: Tag = Tag::Model;
/// Corrected text list (0th IFD `Software`)
pub const CORRECTED_TEXT_TAG: Tag = Tag::Software;

/// Largest EXIF block that fits in one APP1 segment next to the `Exif\0\0` id
pub const MAX_EXIF_LEN: usize = 65_535 - 2 - 6;

const LIST_SEPARATOR: &str = ", ";

/// Tags that describe the TIFF layout rather than the image; the writer
/// synthesises them.
const STRUCTURAL_TAGS: [Tag; 9] = [
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
];

/// Named directory of the EXIF structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Primary,
    Exif,
    Gps,
    Interop,
    Thumbnail,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Primary,
        Segment::Exif,
        Segment::Gps,
        Segment::Interop,
        Segment::Thumbnail,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Segment::Primary => "0th",
            Segment::Exif => "Exif",
            Segment::Gps => "GPS",
            Segment::Interop => "Interop",
            Segment::Thumbnail => "1st",
        }
    }

    fn context(&self) -> Context {
        match self {
            Segment::Primary | Segment::Thumbnail => Context::Tiff,
            Segment::Exif => Context::Exif,
            Segment::Gps => Context::Gps,
            Segment::Interop => Context::Interop,
        }
    }

    fn ifd(&self) -> In {
        match self {
            Segment::Thumbnail => In::THUMBNAIL,
            _ => In::PRIMARY,
        }
    }

    fn of(tag: Tag, ifd: In) -> Option<Segment> {
        match (tag.context(), ifd) {
            (Context::Tiff, In::PRIMARY) => Some(Segment::Primary),
            (Context::Tiff, In::THUMBNAIL) => Some(Segment::Thumbnail),
            (Context::Exif, In::PRIMARY) => Some(Segment::Exif),
            (Context::Gps, In::PRIMARY) => Some(Segment::Gps),
            (Context::Interop, In::PRIMARY) => Some(Segment::Interop),
            _ => None,
        }
    }
}

/// The three strings this pipeline records about a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail {
    pub objects: String,
    pub original_text: String,
    pub corrected_text: String,
}

impl AuditTrail {
    /// Labels in detection order and texts in OCR order, each joined with ", "
    pub fn new(detections: &[Detection], samples: &[TextSample]) -> Self {
        let join = |items: Vec<&str>| items.join(LIST_SEPARATOR);
        Self {
            objects: join(detections.iter().map(|d| d.label.as_str()).collect()),
            original_text: join(samples.iter().map(|s| s.original.as_str()).collect()),
            corrected_text: join(samples.iter().map(|s| s.corrected.as_str()).collect()),
        }
    }
}

/// Tag-keyed EXIF content, grouped by segment; all segments are always present.
#[derive(Debug, Clone)]
pub struct MetadataContainer {
    segments: BTreeMap<Segment, BTreeMap<u16, Value>>,
    thumbnail: Option<Vec<u8>>,
    little_endian: bool,
}

impl Default for MetadataContainer {
    fn default() -> Self {
        Self::empty()
    }
}

impl MetadataContainer {
    pub fn empty() -> Self {
        Self {
            segments: Segment::ALL.iter().map(|&s| (s, BTreeMap::new())).collect(),
            thumbnail: None,
            little_endian: true,
        }
    }

    /// Read the container of `image_bytes`.
    ///
    /// Returns `Ok(None)` when the image carries no EXIF block and
    /// `Err(MetadataError::Parse)` when the block is malformed.
    pub fn try_load(image_bytes: &[u8]) -> Result<Option<Self>, MetadataError> {
        let mut cursor = Cursor::new(image_bytes);
        match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => Ok(Some(Self::from_exif(&exif))),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(err) => Err(MetadataError::Parse(err)),
        }
    }

    /// Like [`try_load`](Self::try_load), falling back to an empty container
    /// when the metadata is absent or unreadable.
    pub fn load(image_bytes: &[u8]) -> Self {
        match Self::try_load(image_bytes) {
            Ok(Some(container)) => {
                debug!(tags = container.tag_count(), "Loaded existing EXIF");
                container
            }
            Ok(None) => {
                debug!("No EXIF in source image, starting empty");
                Self::empty()
            }
            Err(err) => {
                warn!(error = %err, "Discarding unreadable EXIF, starting empty");
                Self::empty()
            }
        }
    }

    pub fn from_exif(exif: &Exif) -> Self {
        let mut container = Self::empty();
        container.little_endian = exif.little_endian();

        for field in exif.fields() {
            if STRUCTURAL_TAGS.contains(&field.tag) {
                continue;
            }
            if let Value::Unknown(type_id, _, _) = field.value {
                warn!(tag = %field.tag, type_id, "Dropping field of unknown type");
                continue;
            }
            match Segment::of(field.tag, field.ifd_num) {
                Some(segment) => {
                    container.set(segment, field.tag.number(), field.value.clone());
                }
                None => warn!(tag = %field.tag, ifd = %field.ifd_num, "Dropping field outside known segments"),
            }
        }

        container.thumbnail = thumbnail_bytes(exif);
        container.drop_orphan_thumbnail_fields();
        container
    }

    /// 1st IFD fields only describe a JPEG thumbnail; without one they are dropped
    fn drop_orphan_thumbnail_fields(&mut self) {
        if self.thumbnail.is_some() {
            return;
        }
        if let Some(fields) = self.segments.get_mut(&Segment::Thumbnail) {
            if !fields.is_empty() {
                warn!(count = fields.len(), "No JPEG thumbnail, dropping 1st IFD fields");
                fields.clear();
            }
        }
    }

    pub fn segment(&self, segment: Segment) -> &BTreeMap<u16, Value> {
        &self.segments[&segment]
    }

    pub fn get(&self, segment: Segment, tag: u16) -> Option<&Value> {
        self.segments[&segment].get(&tag)
    }

    /// Insert or replace a tag, returning the previous value
    pub fn set(&mut self, segment: Segment, tag: u16, value: Value) -> Option<Value> {
        self.segments.entry(segment).or_default().insert(tag, value)
    }

    /// Store `text` as an ASCII-typed field holding its UTF-8 bytes
    pub fn set_text(&mut self, segment: Segment, tag: u16, text: &str) {
        self.set(segment, tag, Value::Ascii(vec![text.as_bytes().to_vec()]));
    }

    /// Read an ASCII-typed field back as UTF-8 text
    pub fn text(&self, segment: Segment, tag: u16) -> Option<String> {
        match self.get(segment, tag)? {
            Value::Ascii(parts) => {
                let joined: Vec<u8> = parts.join(&b'\0');
                Some(String::from_utf8_lossy(&joined).into_owned())
            }
            _ => None,
        }
    }

    pub fn tag_count(&self) -> usize {
        self.segments.values().map(BTreeMap::len).sum()
    }

    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// Overwrite the three audit tags; nothing else changes.
    pub fn set_audit_tags(&mut self, trail: &AuditTrail) {
        self.set_text(Segment::Primary, OBJECTS_TAG.number(), &trail.objects);
        self.set_text(Segment::Primary, ORIGINAL_TEXT_TAG.number(), &trail.original_text);
        self.set_text(Segment::Primary, CORRECTED_TEXT_TAG.number(), &trail.corrected_text);
    }

    pub fn audit_trail(&self) -> Option<AuditTrail> {
        Some(AuditTrail {
            objects: self.text(Segment::Primary, OBJECTS_TAG.number())?,
            original_text: self.text(Segment::Primary, ORIGINAL_TEXT_TAG.number())?,
            corrected_text: self.text(Segment::Primary, CORRECTED_TEXT_TAG.number())?,
        })
    }

    fn fields(&self) -> Vec<Field> {
        self.segments
            .iter()
            .filter(|(segment, _)| **segment != Segment::Thumbnail || self.thumbnail.is_some())
            .flat_map(|(segment, tags)| {
                tags.iter().map(move |(&number, value)| Field {
                    tag: Tag(segment.context(), number),
                    ifd_num: segment.ifd(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Serialise to a TIFF-structured EXIF block (no `Exif\0\0` prefix).
    ///
    /// The 1st IFD is written only together with a JPEG thumbnail.
    pub fn to_exif_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        let fields = self.fields();
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        if let Some(thumbnail) = &self.thumbnail {
            writer.set_jpeg(thumbnail, In::THUMBNAIL);
        }

        let mut buf = Cursor::new(Vec::new());
        writer
            .write(&mut buf, self.little_endian)
            .map_err(MetadataError::Serialize)?;
        Ok(buf.into_inner())
    }
}

/// JPEG-encode `image` with `container` as its EXIF segment
pub fn embed(
    image: &RgbImage,
    container: &MetadataContainer,
    quality: u8,
) -> Result<Vec<u8>, MetadataError> {
    let exif = container.to_exif_bytes()?;
    if exif.len() > MAX_EXIF_LEN {
        return Err(MetadataError::TooLarge(exif.len()));
    }

    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .set_exif_metadata(exif)
            .map_err(|e| MetadataError::Encode(ImageError::Unsupported(e)))?;
        encoder.encode_image(image)?;
    }

    debug!(bytes = out.len(), tags = container.tag_count(), "Encoded annotated JPEG");
    Ok(out)
}

/// Carry the embedded JPEG thumbnail, if its offset and length are sane
fn thumbnail_bytes(exif: &Exif) -> Option<Vec<u8>> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let length = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;

    let bytes = exif.buf().get(offset..offset.checked_add(length)?);
    if bytes.is_none() {
        warn!(offset, length, "Thumbnail points outside the EXIF block, dropping it");
    }
    bytes.map(<[u8]>::to_vec)
}
