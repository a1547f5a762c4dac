//! forwarder - samples a video, counts tracked objects and forwards frames
//! that meet a threshold condition to the vault.
//!
//! Configuration comes from `FORWARDER_CONFIG` (JSON or TOML), then
//! `FORWARDER_*` environment variables, then the command line.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vault_forwarder::{
    Annotator, BackendRegistry, Condition, DetectorBackend, ForwardPolicy, ForwarderConfig,
    FrameDirSink, LogForwarder, NoTiming, Phase, Pipeline, RunReport, ScriptedBackend,
    StubBackend, Timing, TimingReport, Translator, VideoSink, VideoSource, Vocabulary,
    WallClockTiming,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "FORWARDER_CONFIG")]
    config: Option<PathBuf>,

    /// Video file, image directory or stub:// URL.
    #[arg(long)]
    media: Option<String>,

    /// Condition such as "5 persons detected".
    #[arg(long)]
    condition: Option<String>,

    /// first_match or every_match.
    #[arg(long)]
    policy: Option<ForwardPolicy>,

    #[arg(long)]
    max_predictions: Option<u64>,

    /// Directory for annotated frames and bbox_frame.jpg.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report per-phase wall-clock timings.
    #[arg(long)]
    time_verbose: bool,

    /// Write annotated sampled frames to the output directory.
    #[arg(long)]
    save_video: bool,
}

impl Args {
    fn apply(self, cfg: &mut ForwarderConfig) {
        if let Some(media) = self.media {
            cfg.media_path = media;
        }
        if let Some(condition) = self.condition {
            cfg.condition = condition;
        }
        if let Some(policy) = self.policy {
            cfg.forward_policy = policy;
        }
        if let Some(max) = self.max_predictions {
            cfg.classification.max_predictions = max;
        }
        if let Some(output) = self.output {
            cfg.output_path = Some(output);
        }
        cfg.time_verbose |= self.time_verbose;
        cfg.save_video |= self.save_video;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ForwarderConfig::load_layers(args.config.as_deref())?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let report = if cfg.time_verbose {
        execute(&cfg, WallClockTiming::new())?
    } else {
        execute(&cfg, NoTiming)?
    };

    if report.condition_met() {
        log::info!(
            "forwarded {} frame(s): {:?}",
            report.forwarded_frames.len(),
            report.forwarded_frames
        );
    } else {
        log::info!("condition '{}' was never met", cfg.condition);
    }
    Ok(())
}

fn execute<T: Timing>(cfg: &ForwarderConfig, mut timing: T) -> Result<RunReport> {
    let preprocessing = timing.mark();

    let mut detector = build_detector(cfg)?;
    detector.warm_up()?;

    let mut source = VideoSource::new(cfg.source_config())?;
    source
        .connect()
        .with_context(|| format!("failed to open video source {}", cfg.media_path))?;

    let mut sink = match (&cfg.output_path, cfg.save_video) {
        (Some(dir), true) => Some(FrameDirSink::create(dir.join("annotated"))?),
        _ => None,
    };

    let annotator = match &cfg.font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::new(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let pipeline = Pipeline::new(cfg.pipeline_settings(), Condition::parse(&cfg.condition))
        .with_translator(Translator::new().with_overrides(cfg.translations.clone()))
        .with_vocabulary(Vocabulary::new().with_categories(cfg.categories.clone()))
        .with_annotator(annotator)
        .with_stop_flag(stop);
    let mut forwarder = LogForwarder::new();

    timing.record(Phase::Preprocessing, preprocessing);

    let report = pipeline.run(
        &mut source,
        detector.as_mut(),
        sink.as_mut().map(|sink| sink as &mut dyn VideoSink),
        &mut forwarder,
        &mut timing,
    );

    let postprocessing = timing.mark();
    if let (Some(frame), Some(dir)) = (&report.bbox_frame, &cfg.output_path) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join("bbox_frame.jpg");
        frame
            .image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("reference frame written to {}", path.display());
    } else if report.bbox_frame.is_some() {
        log::warn!("create_bbox_frame is set but no output path is configured");
    }
    timing.record(Phase::Postprocessing, postprocessing);

    if report.tracks.is_empty() {
        log::info!("no tracked objects");
    }
    for (object, count) in report.tracks.distinct() {
        log::info!("distinct {}: {}", object, count);
    }

    if let (Some(totals), Some(total)) = (timing.accumulators(), timing.total()) {
        TimingReport {
            totals,
            total,
            classification_fps: cfg.classification.fps,
            source: &report.source,
            source_bytes: source.file_size(),
        }
        .log();
    }

    Ok(report)
}

fn build_detector(cfg: &ForwarderConfig) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());
    if let Some(path) = &cfg.detector.detections_path {
        registry.register(ScriptedBackend::load(path)?);
    }
    registry.set_default(&cfg.detector.name)?;
    let detector = registry.take_default()?;
    log::info!("detector backend: {}", detector.name());
    Ok(detector)
}
