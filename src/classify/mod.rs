//! Label translation and per-frame counting.

mod aggregate;
mod translate;

pub use aggregate::{aggregate, FrameCounts, Vocabulary};
pub use translate::Translator;
