//! Frame annotation.
//!
//! Draws a box and a category label for every tracked detection, on a copy of
//! the frame. Drawing stops at the first detection without a track id.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::classify::Translator;
use crate::detect::{tracked_prefix, BoundingBox, Detection};
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_OFFSET_PX: i32 = 10;
const LABEL_SCALE: f32 = 14.0;

/// A label placed above a box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    /// Anchor point, 10 px above the box's top-left corner, clamped to the image.
    pub x: i32,
    pub y: i32,
}

/// Result of annotating one frame.
#[derive(Clone, Debug)]
pub struct Annotated {
    pub image: RgbImage,
    pub labels: Vec<Label>,
}

pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Annotator that draws boxes and computes label anchors only.
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Annotator that also renders label glyphs with the given TrueType/OpenType font.
    pub fn with_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self { font: Some(font) })
    }

    /// Draw onto a copy of `frame`. The source frame is left untouched.
    pub fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
        translator: &Translator,
    ) -> Annotated {
        let mut image = frame.image.clone();
        let mut labels = Vec::new();

        for (detection, track_id) in tracked_prefix(detections) {
            let Some(rect) = clamp_rect(&detection.bbox, image.width(), image.height()) else {
                log::debug!("track {} box outside frame, skipped", track_id);
                continue;
            };
            draw_box(&mut image, rect);

            let label = Label {
                text: translator.translate(&detection.class_label).to_string(),
                x: rect.left(),
                y: (rect.top() - LABEL_OFFSET_PX).max(0),
            };
            match &self.font {
                Some(font) => {
                    let top = (label.y - LABEL_SCALE as i32).max(0);
                    draw_text_mut(
                        &mut image,
                        BOX_COLOR,
                        label.x,
                        top,
                        PxScale::from(LABEL_SCALE),
                        font,
                        &label.text,
                    );
                }
                None => log::debug!("label '{}' at ({}, {})", label.text, label.x, label.y),
            }
            labels.push(label);
        }

        Annotated { image, labels }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x0 = bbox.x_min.clamp(0.0, max_x) as i32;
    let y0 = bbox.y_min.clamp(0.0, max_y) as i32;
    let x1 = bbox.x_max.clamp(0.0, max_x) as i32;
    let y1 = bbox.y_max.clamp(0.0, max_y) as i32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
}

fn draw_box(image: &mut RgbImage, rect: Rect) {
    for inset in 0..BOX_THICKNESS {
        let w = rect.width().saturating_sub(2 * inset);
        let h = rect.height().saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let ring = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(image, ring, BOX_COLOR);
    }
}
