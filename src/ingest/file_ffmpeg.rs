//! Video file / live URL source using FFmpeg.
//!
//! Frames are decoded in-memory and converted to RGB24. Files report their
//! frame count; live URLs report `None` and run until a read fails.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use super::decode::{PacketDecoder, Pump};
use super::file::{SourceConfig, SourceStats};
use crate::frame::{Frame, StreamInfo};

pub(crate) struct FfmpegSource {
    config: SourceConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    pump: Pump,
    scaler: ffmpeg::software::scaling::Context,
    info: StreamInfo,
    frame_count: u64,
}

impl FfmpegSource {
    pub(crate) fn new(config: SourceConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("unable to open video source '{}'", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", config.path))?;
        let stream_index = input_stream.index();

        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            f64::from(rate)
        } else {
            config.nominal_fps
        };
        let frames = input_stream.frames();
        let frame_count = (frames > 0).then_some(frames as u64);

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = StreamInfo {
            fps,
            frame_count,
            width: decoder.width(),
            height: decoder.height(),
        };

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            pump: Pump::default(),
            scaler,
            info,
            frame_count: 0,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "VideoSource: connected to {} (ffmpeg, {:.2} fps, {}x{})",
            self.config.path,
            self.info.fps,
            self.info.width,
            self.info.height
        );
        Ok(())
    }

    pub(crate) fn info(&self) -> StreamInfo {
        self.info.clone()
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let stream_index = self.stream_index;
        let input = &mut self.input;
        let decoded = self.pump.next(&mut self.decoder, || {
            input
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet)
        })?;
        let Some(decoded) = decoded else {
            bail!("'{}' ended after {} frames", self.config.path, self.frame_count);
        };

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let image = frame_to_image(&rgb_frame)?;

        let index = self.frame_count;
        self.frame_count += 1;
        Ok(Frame::new(index, image))
    }

    pub(crate) fn file_size(&self) -> Option<u64> {
        std::fs::metadata(Path::new(&self.config.path))
            .ok()
            .map(|meta| meta.len())
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

impl PacketDecoder for ffmpeg::codec::decoder::Video {
    type Packet = ffmpeg::Packet;
    type Output = ffmpeg::frame::Video;

    fn receive(&mut self) -> Option<ffmpeg::frame::Video> {
        let mut decoded = ffmpeg::frame::Video::empty();
        self.receive_frame(&mut decoded).ok().map(|_| decoded)
    }

    fn send(&mut self, packet: &ffmpeg::Packet) -> Result<()> {
        self.send_packet(packet)
            .context("send packet to ffmpeg decoder")
    }

    fn end_of_stream(&mut self) -> Result<()> {
        self.send_eof().context("flush ffmpeg decoder")
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("decoded frame does not match {}x{}", width, height))
}
