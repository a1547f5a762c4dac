//! Frame ingestion sources.
//!
//! Sources hand decoded frames to the loop driver one at a time:
//! - synthetic `stub://` streams (testing, dry runs)
//! - directories of still images
//! - video files and live URLs (feature: ingest-ffmpeg)
//!
//! A source is opened before the loop and released after it on every exit
//! path. Read failures are not retried.

use anyhow::Result;

use crate::frame::{Frame, StreamInfo};

#[cfg_attr(not(feature = "ingest-ffmpeg"), allow(dead_code))]
mod decode;
pub mod file;
#[cfg(feature = "ingest-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{SourceConfig, SourceStats, VideoSource};

/// A finite or live, ordered stream of frames.
pub trait FrameSource {
    /// Stream properties, valid once the source is open.
    fn info(&self) -> StreamInfo;

    /// Read the next frame. An `Err` ends the stream.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying handle. Called once after the loop exits.
    fn release(&mut self) {}
}
