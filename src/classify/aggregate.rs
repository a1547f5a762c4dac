//! Per-frame class counting.

use std::collections::BTreeMap;
use std::fmt;

use crate::classify::translate::Translator;
use crate::detect::{tracked_prefix, Detection};

/// Category names and the translated object name each one counts.
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("persons", "pedestrian"),
    ("cars", "car"),
    ("trucks", "truck"),
];

/// The set of categories a frame is counted against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    /// category -> translated object name
    categories: BTreeMap<String, String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(category, object)| (category.to_string(), object.to_string()))
                .collect(),
        }
    }

    /// Add categories on top of the defaults, e.g. `("buses", "bus")`.
    pub fn with_categories<I, K, V>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (category, object) in extra {
            self.categories.insert(category.into(), object.into());
        }
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every category counting `object`. Several categories may share one name.
    fn categories_for<'a>(&'a self, object: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.categories
            .iter()
            .filter(move |(_, name)| name.as_str() == object)
            .map(|(category, _)| category.as_str())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-category object counts for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    counts: BTreeMap<String, u32>,
}

impl FrameCounts {
    /// All categories of the vocabulary at zero.
    pub fn zeroed(vocabulary: &Vocabulary) -> Self {
        Self {
            counts: vocabulary
                .categories()
                .map(|category| (category.to_string(), 0))
                .collect(),
        }
    }

    /// Count for a category, `None` when the category is not in the vocabulary.
    pub fn get(&self, category: &str) -> Option<u32> {
        self.counts.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(category, count)| (category.as_str(), *count))
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    fn increment(&mut self, category: &str) {
        if let Some(count) = self.counts.get_mut(category) {
            *count = count.saturating_add(1);
        }
    }
}

impl fmt::Display for FrameCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (category, count) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", category, count)?;
            first = false;
        }
        Ok(())
    }
}

/// Count one frame's detections.
///
/// Counting stops at the first detection without a track id; it and every
/// entry after it are ignored. Translated names outside the vocabulary are
/// skipped.
pub fn aggregate(
    detections: &[Detection],
    translator: &Translator,
    vocabulary: &Vocabulary,
) -> FrameCounts {
    let mut counts = FrameCounts::zeroed(vocabulary);
    for (detection, _) in tracked_prefix(detections) {
        let object = translator.translate(&detection.class_label);
        for category in vocabulary.categories_for(object) {
            counts.increment(category);
        }
    }
    log::info!("{}", counts);
    counts
}
