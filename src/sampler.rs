//! Frame sampling bookkeeping.

/// Number of source frames between two frames submitted for detection.
///
/// `floor(source_fps / target_fps)`. A ratio that is not a positive finite
/// number yields 0, which disables sampling.
pub fn skip_factor(source_fps: f64, target_fps: f64) -> u64 {
    let ratio = source_fps / target_fps;
    if ratio.is_finite() && ratio >= 1.0 {
        ratio.floor() as u64
    } else {
        0
    }
}

/// Per-run sampling state, owned by the loop driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplingState {
    /// Index of the frame about to be processed.
    pub frame_number: u64,
    /// Frames actually submitted for detection.
    pub predicted_frames: u64,
    pub skip_factor: u64,
}

impl SamplingState {
    pub fn new(skip_factor: u64) -> Self {
        Self {
            frame_number: 0,
            predicted_frames: 0,
            skip_factor,
        }
    }

    pub fn from_rates(source_fps: f64, target_fps: f64) -> Self {
        Self::new(skip_factor(source_fps, target_fps))
    }

    /// Whether the current frame goes to the detector. Frame 0 never does.
    pub fn should_sample(&self) -> bool {
        self.frame_number > 0
            && self.skip_factor > 0
            && self.frame_number % self.skip_factor == 0
    }

    /// True while another frame may be read.
    pub fn has_budget(&self, max_predictions: u64, frame_count: Option<u64>) -> bool {
        self.predicted_frames < max_predictions
            && frame_count.map_or(true, |total| self.frame_number < total)
    }

    pub fn record_prediction(&mut self) {
        self.predicted_frames += 1;
    }

    pub fn advance(&mut self) {
        self.frame_number += 1;
    }
}
