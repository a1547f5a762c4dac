//! Frame containers.
//!
//! - `Frame`: one decoded RGB picture plus its position in the source stream.
//! - `StreamInfo`: what a source reports about itself before the loop starts.
//!
//! Frames are owned by the loop iteration that read them. Anything that needs
//! to draw on a frame works on a copy (`Frame::clone` is a deep copy).

use image::RgbImage;

/// A decoded frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// 0-based position in the source stream.
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw interleaved RGB bytes.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Properties of an opened stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    /// Nominal frames per second of the source.
    pub fps: f64,
    /// Total frame count, `None` for live sources with no known end.
    pub frame_count: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    /// Length of the source in seconds, when it is finite and the fps is sane.
    pub fn duration_secs(&self) -> Option<f64> {
        match self.frame_count {
            Some(count) if self.fps > 0.0 && self.fps.is_finite() => Some(count as f64 / self.fps),
            _ => None,
        }
    }
}
