mod common;

use std::sync::Arc;

use annotext::metadata::{AuditTrail, CORRECTED_TEXT_TAG, OBJECTS_TAG, ORIGINAL_TEXT_TAG, embed};
use common::*;
use exif::{In, Tag};

fn car_pipeline() -> anyhow::Result<Pipeline> {
    let detector = FakeDetector::new(
        vec![raw_detection(0, 0.9, 10, 10, 60, 60), raw_detection(1, 0.8, 70, 10, 110, 60)],
        labels(&[(0, "car"), (1, "dog")]),
    );
    let translator = Arc::new(FakeTranslator::new(&[("car", "машина"), ("dog", "собака")]));
    Ok(Pipeline::new(Arc::new(detector), translator, &Config::default())?)
}

#[tokio::test]
async fn test_existing_tags_survive_and_audit_tags_are_added() -> anyhow::Result<()> {
    let (input, fields) = jpeg_with_exif(128, 96);
    let before = MetadataContainer::try_load(&input)?.expect("fixture carries EXIF");
    assert_eq!(before.tag_count(), fields.len());

    let result = car_pipeline()?.run(&input).await?;
    let after = MetadataContainer::try_load(&result.annotated_image)?.expect("output carries EXIF");

    assert_eq!(after.tag_count(), fields.len() + 3);
    assert_eq!(
        after.text(Segment::Primary, Tag::Artist.number()).as_deref(),
        Some("Jane Roe")
    );
    assert_eq!(
        after.text(Segment::Primary, Tag::Copyright.number()).as_deref(),
        Some("(c) 2024")
    );
    assert_eq!(
        after.text(Segment::Exif, Tag::DateTimeOriginal.number()).as_deref(),
        Some("2024:05:01 10:00:00")
    );
    assert_eq!(
        after.text(Segment::Primary, OBJECTS_TAG.number()).as_deref(),
        Some("машина, собака")
    );

    Ok(())
}

#[tokio::test]
async fn test_image_without_exif_gets_exactly_the_audit_tags() -> anyhow::Result<()> {
    let input = encode_jpeg(&create_test_image(64, 64), None);
    assert!(MetadataContainer::try_load(&input)?.is_none());

    let result = car_pipeline()?.run(&input).await?;
    let after = MetadataContainer::try_load(&result.annotated_image)?.expect("output carries EXIF");

    assert_eq!(after.tag_count(), 3);
    for tag in [OBJECTS_TAG, ORIGINAL_TEXT_TAG, CORRECTED_TEXT_TAG] {
        assert!(after.get(Segment::Primary, tag.number()).is_some(), "{tag}");
    }

    Ok(())
}

#[tokio::test]
async fn test_existing_audit_tags_are_overwritten() -> anyhow::Result<()> {
    let fields = vec![
        ascii_field(Tag::Make, In::PRIMARY, "Canon"),
        ascii_field(Tag::Artist, In::PRIMARY, "Jane Roe"),
    ];
    let input = encode_jpeg(&create_test_image(64, 64), Some(exif_block(&fields)));

    let result = car_pipeline()?.run(&input).await?;
    let after = MetadataContainer::try_load(&result.annotated_image)?.expect("output carries EXIF");

    assert_eq!(after.tag_count(), 4);
    assert_eq!(
        after.text(Segment::Primary, Tag::Make.number()).as_deref(),
        Some("машина, собака")
    );

    Ok(())
}

#[test]
fn test_oversized_trail_is_an_encode_failure() {
    let mut container = MetadataContainer::empty();
    let huge = "x".repeat(70_000);
    container.set_audit_tags(&AuditTrail {
        objects: huge,
        original_text: String::new(),
        corrected_text: String::new(),
    });

    let err = embed(&create_test_image(8, 8), &container, 90).unwrap_err();
    assert!(matches!(err, annotext::core::MetadataError::TooLarge(_)));
}

#[test]
fn test_embed_round_trips_utf8_text() -> anyhow::Result<()> {
    let mut container = MetadataContainer::empty();
    let trail = AuditTrail {
        objects: "кошка, собака".to_string(),
        original_text: "Превет, как деал?".to_string(),
        corrected_text: "Привет, как дела?".to_string(),
    };
    container.set_audit_tags(&trail);

    let jpeg = embed(&create_test_image(16, 16), &container, 90)?;
    let loaded = MetadataContainer::try_load(&jpeg)?.expect("EXIF present");
    assert_eq!(loaded.audit_trail(), Some(trail));

    Ok(())
}

#[tokio::test]
async fn test_jpeg_thumbnail_is_carried_over() -> anyhow::Result<()> {
    let thumbnail = encode_jpeg(&create_test_image(8, 8), None);
    let input = jpeg_with_thumbnail(128, 96, &thumbnail);

    let before = MetadataContainer::try_load(&input)?.expect("fixture carries EXIF");
    assert_eq!(before.thumbnail(), Some(thumbnail.as_slice()));

    let result = car_pipeline()?.run(&input).await?;
    let after = MetadataContainer::try_load(&result.annotated_image)?.expect("output carries EXIF");

    assert_eq!(after.thumbnail(), Some(thumbnail.as_slice()));
    assert!(image::load_from_memory(after.thumbnail().expect("thumbnail")).is_ok());
    assert_eq!(after.segment(Segment::Thumbnail).len(), thumbnail_fields().len());
    let compression = after
        .get(Segment::Thumbnail, Tag::Compression.number())
        .and_then(|value| value.get_uint(0));
    assert_eq!(compression, Some(6));
    assert!(matches!(
        after.get(Segment::Thumbnail, Tag::XResolution.number()),
        Some(exif::Value::Rational(r)) if r[0].num == 72 && r[0].denom == 1
    ));
    assert_eq!(
        after.text(Segment::Primary, Tag::Artist.number()).as_deref(),
        Some("Jane Roe")
    );

    Ok(())
}

#[tokio::test]
async fn test_thumbnail_fields_without_jpeg_thumbnail_are_dropped() -> anyhow::Result<()> {
    let input = jpeg_with_strip_thumbnail(64, 64);

    let before = MetadataContainer::try_load(&input)?.expect("fixture carries EXIF");
    assert!(before.thumbnail().is_none());
    assert!(before.segment(Segment::Thumbnail).is_empty());

    let result = car_pipeline()?.run(&input).await?;
    let after = MetadataContainer::try_load(&result.annotated_image)?.expect("output carries EXIF");

    assert!(after.segment(Segment::Thumbnail).is_empty());
    assert_eq!(after.tag_count(), 1 + 3);
    assert_eq!(
        after.text(Segment::Primary, Tag::Artist.number()).as_deref(),
        Some("Jane Roe")
    );

    Ok(())
}
