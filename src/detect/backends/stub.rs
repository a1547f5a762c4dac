use anyhow::Result;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for dry runs. Never reports an object, like a tracker that
/// is still warming up.
#[derive(Debug, Default)]
pub struct StubBackend {
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames this backend has been asked to process.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<Vec<Detection>> {
        self.calls += 1;
        Ok(Vec::new())
    }
}
