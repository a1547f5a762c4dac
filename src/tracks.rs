use std::collections::{BTreeMap, BTreeSet};

use crate::classify::Translator;
use crate::detect::{tracked_prefix, Detection};

/// Distinct track ids seen over a run, per translated object name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackLedger {
    tracks: BTreeMap<String, BTreeSet<u64>>,
}

impl TrackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame. Stops at the first detection without a track id.
    pub fn observe(&mut self, detections: &[Detection], translator: &Translator) {
        for (detection, track_id) in tracked_prefix(detections) {
            let object = translator.translate(&detection.class_label);
            self.tracks
                .entry(object.to_string())
                .or_default()
                .insert(track_id);
        }
    }

    /// Number of distinct objects per name.
    pub fn distinct(&self) -> impl Iterator<Item = (&str, usize)> {
        self.tracks
            .iter()
            .map(|(object, ids)| (object.as_str(), ids.len()))
    }

    pub fn ids(&self, object: &str) -> Option<&BTreeSet<u64>> {
        self.tracks.get(object)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
