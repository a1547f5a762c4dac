//! Threshold conditions over frame counts.
//!
//! Grammar: `"<non-negative integer> <category> detected"`, for example
//! `"5 persons detected"`. Anything else parses to [`Condition::Never`].

use std::fmt;
use std::sync::OnceLock;

use crate::classify::FrameCounts;

/// A parsed forwarding condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// At least `threshold` objects of `category` in the frame.
    AtLeast { threshold: u32, category: String },
    /// Text that did not parse. Never satisfied.
    Never,
}

impl Condition {
    /// Parse condition text. Never fails; malformed text yields `Never`.
    pub fn parse(text: &str) -> Self {
        static CONDITION_RE: OnceLock<Option<regex::Regex>> = OnceLock::new();
        let Some(re) = CONDITION_RE
            .get_or_init(|| regex::Regex::new(r"^(\d+)\s+(\w+)\s+detected\n?$").ok())
            .as_ref()
        else {
            return Condition::Never;
        };
        let Some(caps) = re.captures(text) else {
            return Condition::Never;
        };
        let Ok(threshold) = caps[1].parse::<u32>() else {
            return Condition::Never;
        };
        Condition::AtLeast {
            threshold,
            category: caps[2].to_string(),
        }
    }

    /// True when the counts satisfy the condition. Unknown categories never do.
    pub fn evaluate(&self, counts: &FrameCounts) -> bool {
        match self {
            Condition::AtLeast {
                threshold,
                category,
            } => counts
                .get(category)
                .is_some_and(|count| count >= *threshold),
            Condition::Never => false,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Condition::Never)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::AtLeast {
                threshold,
                category,
            } => write!(f, "{} {} detected", threshold, category),
            Condition::Never => f.write_str("<never>"),
        }
    }
}
