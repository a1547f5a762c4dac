//! Video frame source.
//!
//! `VideoSource` opens one of:
//! - `stub://<name>`: synthetic frames for dry runs and tests
//! - a directory of still images, read in file-name order
//! - a video file or live URL (feature: ingest-ffmpeg)
//!
//! Opening is fatal on failure. A failed read mid-run is reported as an `Err`
//! from `next_frame`, which the loop treats as the end of the stream.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;

#[cfg(feature = "ingest-ffmpeg")]
use super::file_ffmpeg::FfmpegSource;
use super::FrameSource;
use crate::frame::{Frame, StreamInfo};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Configuration for a video source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceConfig {
    /// File path, image directory, `stub://` name or (with ffmpeg) a live URL.
    pub path: String,
    /// Frame rate reported by sources that carry none (stub, image directory).
    pub nominal_fps: f64,
    /// Length of a `stub://` stream.
    pub synthetic_frames: u64,
    /// Frame size of a `stub://` stream.
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            nominal_fps: 30.0,
            synthetic_frames: 300,
            width: 640,
            height: 480,
        }
    }
}

/// Video frame source.
pub struct VideoSource {
    backend: VideoBackend,
}

enum VideoBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequenceSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegSource),
    /// Closed; the underlying handle has been dropped.
    Released(ReleasedSource),
}

struct ReleasedSource {
    info: StreamInfo,
    stats: SourceStats,
    file_size: Option<u64>,
}

impl VideoSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.path.trim().is_empty() {
            bail!("no media path configured");
        }
        if config.path.starts_with("stub://") {
            return Ok(Self {
                backend: VideoBackend::Synthetic(SyntheticSource::new(config)),
            });
        }
        if Path::new(&config.path).is_dir() {
            return Ok(Self {
                backend: VideoBackend::Images(ImageSequenceSource::new(config)?),
            });
        }
        #[cfg(feature = "ingest-ffmpeg")]
        {
            Ok(Self {
                backend: VideoBackend::Ffmpeg(FfmpegSource::new(config)?),
            })
        }
        #[cfg(not(feature = "ingest-ffmpeg"))]
        {
            Err(anyhow!(
                "unable to open '{}': video files and live URLs require the ingest-ffmpeg feature",
                config.path
            ))
        }
    }

    /// Connect to the source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            VideoBackend::Synthetic(source) => source.connect(),
            VideoBackend::Images(source) => source.connect(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.connect(),
            VideoBackend::Released(released) => {
                bail!("source {} was released", released.stats.path)
            }
        }
    }

    /// Size of the media on disk, for file-backed sources.
    pub fn file_size(&self) -> Option<u64> {
        match &self.backend {
            VideoBackend::Synthetic(_) => None,
            VideoBackend::Images(source) => Some(source.total_bytes()),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.file_size(),
            VideoBackend::Released(released) => released.file_size,
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            VideoBackend::Synthetic(source) => source.stats(),
            VideoBackend::Images(source) => source.stats(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.stats(),
            VideoBackend::Released(released) => released.stats.clone(),
        }
    }

    /// Whether `release` has closed the underlying handle.
    pub fn is_released(&self) -> bool {
        matches!(self.backend, VideoBackend::Released(_))
    }
}

impl FrameSource for VideoSource {
    fn info(&self) -> StreamInfo {
        match &self.backend {
            VideoBackend::Synthetic(source) => source.info(),
            VideoBackend::Images(source) => source.info(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.info(),
            VideoBackend::Released(released) => released.info.clone(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            VideoBackend::Synthetic(source) => source.next_frame(),
            VideoBackend::Images(source) => source.next_frame(),
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
            VideoBackend::Released(released) => {
                bail!("source {} was released", released.stats.path)
            }
        }
    }

    fn release(&mut self) {
        if matches!(self.backend, VideoBackend::Released(_)) {
            return;
        }
        let released = ReleasedSource {
            info: self.info(),
            stats: self.stats(),
            file_size: self.file_size(),
        };
        log::info!(
            "closing source {} after {} frames",
            released.stats.path,
            released.stats.frames_read
        );
        self.backend = VideoBackend::Released(released);
    }
}

/// Statistics for a video source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_read: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and dry runs
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("VideoSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            fps: self.config.nominal_fps,
            frame_count: Some(self.config.synthetic_frames),
            width: self.config.width,
            height: self.config.height,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.frame_count >= self.config.synthetic_frames {
            bail!("synthetic stream ended after {} frames", self.frame_count);
        }
        let index = self.frame_count;
        let image = self.generate_synthetic_image();
        self.frame_count += 1;
        Ok(Frame::new(index, image))
    }

    fn generate_synthetic_image(&mut self) -> RgbImage {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.frame_count + self.scene_state as u64;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            let v = ((x as u64 + y as u64 + shift) % 256) as u8;
            image::Rgb([v, v.wrapping_add(85), v.wrapping_add(170)])
        })
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Image-sequence source (directory of stills)
// ----------------------------------------------------------------------------

struct ImageSequenceSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl ImageSequenceSource {
    fn new(config: SourceConfig) -> Result<Self> {
        let dir = Path::new(&config.path);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to list image directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                files.push(path);
            }
        }
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| anyhow!("image directory {} has no frames", dir.display()))?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("failed to read {}", first.display()))?;

        Ok(Self {
            config,
            files,
            width,
            height,
            frame_count: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "VideoSource: connected to {} ({} images)",
            self.config.path,
            self.files.len()
        );
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            fps: self.config.nominal_fps,
            frame_count: Some(self.files.len() as u64),
            width: self.width,
            height: self.height,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let index = self.frame_count;
        let path = self
            .files
            .get(index as usize)
            .ok_or_else(|| anyhow!("image sequence ended after {} frames", index))?;
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        self.frame_count += 1;
        Ok(Frame::new(index, image))
    }

    fn total_bytes(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|path| std::fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}
