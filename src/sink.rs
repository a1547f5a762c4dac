//! Output side channels: annotated frames and forward decisions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::classify::FrameCounts;
use crate::frame::Frame;

/// Receives annotated frames.
pub trait VideoSink {
    fn write(&mut self, image: &RgbImage) -> Result<()>;

    /// Flush and close. Called once after the loop exits.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes annotated frames as numbered JPEG files into a directory.
pub struct FrameDirSink {
    dir: PathBuf,
    written: u64,
}

impl FrameDirSink {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl VideoSink for FrameDirSink {
    fn write(&mut self, image: &RgbImage) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.jpg", self.written));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        log::info!(
            "releasing frame writer: {} frames in {}",
            self.written,
            self.dir.display()
        );
        Ok(())
    }
}

/// The pipeline's decision to hand a frame to the vault.
#[derive(Clone, Debug)]
pub struct ForwardDecision {
    pub frame_number: u64,
    pub counts: FrameCounts,
    /// The frame that met the condition, unannotated.
    pub frame: Frame,
}

/// Downstream consumer of forward decisions.
pub trait Forwarder {
    fn forward(&mut self, decision: &ForwardDecision) -> Result<()>;
}

/// Forwarder that only records the decision in the log.
#[derive(Debug, Default)]
pub struct LogForwarder {
    forwarded: u64,
}

impl LogForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}

impl Forwarder for LogForwarder {
    fn forward(&mut self, decision: &ForwardDecision) -> Result<()> {
        self.forwarded += 1;
        log::info!(
            "Condition met, forwarding video to remote vault (frame {}, {})",
            decision.frame_number,
            decision.counts
        );
        Ok(())
    }
}
