//! Condition-gated frame forwarding.
//!
//! Reads a video stream, runs a detector/tracker on sampled frames, counts the
//! tracked objects per category and decides, with a textual threshold
//! condition such as `"5 persons detected"`, whether a frame is forwarded to
//! the vault.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (synthetic, image directories, video via ffmpeg)
//! - `detect`: Detector backends and detection results
//! - `classify`: Label translation and per-frame counting
//! - `condition`: Threshold condition parsing and evaluation
//! - `sampler`: Frame skip bookkeeping
//! - `pipeline`: The loop driver
//! - `annotate`: Boxes and labels on frame copies
//! - `timing`: Optional wall-clock instrumentation
//! - `sink`: Annotated-frame writer and forward decisions
//! - `config`: Run configuration (file + environment)

pub mod annotate;
pub mod classify;
pub mod condition;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod sampler;
pub mod sink;
pub mod timing;
pub mod tracks;

pub use annotate::{Annotated, Annotator, Label};
pub use classify::{aggregate, FrameCounts, Translator, Vocabulary};
pub use condition::Condition;
pub use config::ForwarderConfig;
pub use detect::{
    BackendRegistry, BoundingBox, DetectParams, Detection, DetectorBackend, ScriptedBackend,
    StubBackend,
};
pub use frame::{Frame, StreamInfo};
pub use ingest::{FrameSource, SourceConfig, VideoSource};
pub use pipeline::{ForwardPolicy, Pipeline, PipelineSettings, RunReport, StopReason};
pub use sampler::{skip_factor, SamplingState};
pub use sink::{ForwardDecision, Forwarder, FrameDirSink, LogForwarder, VideoSink};
pub use timing::{NoTiming, Phase, Timing, TimingAccumulators, TimingReport, WallClockTiming};
pub use tracks::TrackLedger;
