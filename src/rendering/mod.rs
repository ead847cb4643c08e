//! Box and label overlay.
//!
//! Labels are rasterised with an embedded DejaVu Sans face, which covers both
//! Latin and Cyrillic so translated labels render without tofu.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::core::errors::RenderError;
use crate::models::Detection;

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Box outline thickness in pixels
pub const STROKE_WIDTH: i32 = 2;
/// Gap between the top of a box and the bottom of its label
pub const LABEL_MARGIN: i32 = 10;
/// Offsets of the three stacked label strokes
const BOLD_OFFSETS: [i32; 3] = [-1, 0, 1];

pub struct AnnotationRenderer {
    font: FontArc,
    scale: PxScale,
}

impl AnnotationRenderer {
    /// Renderer using the embedded font
    pub fn new(font_scale: f32) -> Result<Self, RenderError> {
        Self::with_font(FontArc::try_from_slice(EMBEDDED_FONT)?, font_scale)
    }

    /// Renderer using caller-supplied TrueType/OpenType bytes
    pub fn from_font_bytes(font_data: Vec<u8>, font_scale: f32) -> Result<Self, RenderError> {
        Self::with_font(FontArc::try_from_vec(font_data)?, font_scale)
    }

    fn with_font(font: FontArc, font_scale: f32) -> Result<Self, RenderError> {
        if !(font_scale.is_finite() && font_scale > 0.0) {
            return Err(RenderError::InvalidScale(font_scale));
        }
        Ok(Self {
            font,
            scale: PxScale::from(font_scale),
        })
    }

    /// Draw every detection onto a copy of `image`, in order.
    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            let color = Rgb::from(detection.color);
            self.draw_box(&mut canvas, detection, color);
            self.draw_label(&mut canvas, detection, color);
        }
        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let bbox = detection.bbox;
        let (width, height) = canvas.dimensions();

        // Edges beyond the frame are pulled in to just past it, where they stay invisible
        let x1 = clamp_to_frame(bbox.x1, width, STROKE_WIDTH);
        let y1 = clamp_to_frame(bbox.y1, height, STROKE_WIDTH);
        let x2 = clamp_to_frame(bbox.x2, width, STROKE_WIDTH);
        let y2 = clamp_to_frame(bbox.y2, height, STROKE_WIDTH);

        // Strokes grow inwards so the outer edge sits exactly on the box
        for inset in 0..STROKE_WIDTH {
            let w = x2 - x1 + 1 - 2 * inset;
            let h = y2 - y1 + 1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let label = detection.label.as_str();
        if label.is_empty() {
            return;
        }

        let (text_width, text_height) = text_size(self.scale, &self.font, label);
        let (width, height) = canvas.dimensions();
        let margin = text_width.max(text_height) as i32 + 1;

        let x = clamp_to_frame(detection.bbox.x1, width, margin);
        let y = clamp_to_frame(
            detection
                .bbox
                .y1
                .saturating_sub(LABEL_MARGIN)
                .saturating_sub(text_height as i32),
            height,
            margin,
        );

        for offset in BOLD_OFFSETS {
            draw_text_mut(canvas, color, x + offset, y + offset, self.scale, &self.font, label);
        }
    }
}

/// Clamp a coordinate to `[-margin, extent - 1 + margin]`
fn clamp_to_frame(value: i32, extent: u32, margin: i32) -> i32 {
    let upper = i64::from(extent) - 1 + i64::from(margin);
    let clamped = i64::from(value).clamp(-i64::from(margin), upper);
    i32::try_from(clamped).unwrap_or(i32::MAX)
}
