use serde::Deserialize;

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

/// One object instance found in a single frame.
///
/// `track_id` persists across frames for the same physical object. Trackers
/// leave it empty when they have nothing confident to report, and those
/// entries trail the tracked ones in a frame's result list.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Detection {
    #[serde(alias = "class", alias = "label")]
    pub class_label: String,
    #[serde(alias = "box")]
    pub bbox: BoundingBox,
    #[serde(default, alias = "id")]
    pub track_id: Option<u64>,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn tracked(class_label: &str, bbox: BoundingBox, track_id: u64) -> Self {
        Self {
            class_label: class_label.to_string(),
            bbox,
            track_id: Some(track_id),
            confidence: 1.0,
        }
    }

    pub fn untracked(class_label: &str, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.to_string(),
            bbox,
            track_id: None,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Iterate a frame's detections up to (not including) the first one without
/// a track id. Everything after that entry is treated as "no further objects".
pub fn tracked_prefix(detections: &[Detection]) -> impl Iterator<Item = (&Detection, u64)> {
    detections
        .iter()
        .map_while(|detection| detection.track_id.map(|id| (detection, id)))
}
