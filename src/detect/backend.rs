use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Per-call detector parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Minimum confidence for a detection to be reported.
    pub confidence: f32,
    /// Keep tracker state between calls so track ids stay stable.
    pub persist: bool,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence: 0.3,
            persist: true,
        }
    }
}

/// Detector/tracker backend trait.
///
/// A backend owns whatever model and tracker state it needs. The loop calls
/// `detect` once per sampled frame and treats the call as blocking.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection and tracking on a frame.
    ///
    /// The returned list is ordered: entries with a track id come before
    /// entries without one. An empty list is a normal result.
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        (**self).detect(frame, params)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
