//! Replay backend.
//!
//! Plays back tracker output recorded ahead of time, keyed by frame number.
//! The file format is JSON:
//!
//! ```json
//! { "frames": { "3": [ { "class": "person", "box": {...}, "id": 1 } ] } }
//! ```
//!
//! Frames missing from the file produce no detections.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct ScriptFile {
    frames: HashMap<String, Vec<Detection>>,
}

/// Backend that replays recorded detections per frame number.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    frames: HashMap<u64, Vec<Detection>>,
    calls: Vec<u64>,
}

impl ScriptedBackend {
    pub fn from_frames(frames: HashMap<u64, Vec<Detection>>) -> Self {
        Self {
            frames,
            calls: Vec::new(),
        }
    }

    /// Load a recorded script from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid detection script {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(raw)?;
        let mut frames = HashMap::with_capacity(file.frames.len());
        for (key, detections) in file.frames {
            let index: u64 = key
                .trim()
                .parse()
                .map_err(|_| anyhow!("frame key '{}' is not a frame number", key))?;
            frames.insert(index, detections);
        }
        Ok(Self::from_frames(frames))
    }

    /// Frame numbers this backend was called with, in call order.
    pub fn calls(&self) -> &[u64] {
        &self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        self.calls.push(frame.index);
        let Some(recorded) = self.frames.get(&frame.index) else {
            return Ok(Vec::new());
        };
        Ok(recorded
            .iter()
            .filter(|detection| detection.confidence >= params.confidence)
            .cloned()
            .collect())
    }
}
