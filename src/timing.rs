//! Optional wall-clock instrumentation.
//!
//! The loop is generic over [`Timing`]. `NoTiming` has a unit mark and empty
//! methods, so a run without instrumentation never reads the clock.

use std::time::{Duration, Instant};

use crate::frame::StreamInfo;

/// Phases accumulated over a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Preprocessing,
    Detection,
    Processing,
    Postprocessing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimingAccumulators {
    pub preprocessing: Duration,
    pub detection: Duration,
    pub processing: Duration,
    pub postprocessing: Duration,
}

impl TimingAccumulators {
    fn add(&mut self, phase: Phase, elapsed: Duration) {
        let slot = match phase {
            Phase::Preprocessing => &mut self.preprocessing,
            Phase::Detection => &mut self.detection,
            Phase::Processing => &mut self.processing,
            Phase::Postprocessing => &mut self.postprocessing,
        };
        *slot += elapsed;
    }

    /// Processing time not spent inside the detector.
    pub fn other_processing(&self) -> Duration {
        self.processing.saturating_sub(self.detection)
    }
}

/// Instrumentation capability, selected once at startup.
pub trait Timing {
    type Mark: Copy;

    /// Take a mark at the start of a phase.
    fn mark(&self) -> Self::Mark;

    /// Add the time since `since` to `phase`.
    fn record(&mut self, phase: Phase, since: Self::Mark);

    /// Accumulated totals, `None` when instrumentation is off.
    fn accumulators(&self) -> Option<&TimingAccumulators>;

    /// Time since the run started, `None` when instrumentation is off.
    fn total(&self) -> Option<Duration>;
}

/// Instrumentation switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTiming;

impl Timing for NoTiming {
    type Mark = ();

    #[inline(always)]
    fn mark(&self) {}

    #[inline(always)]
    fn record(&mut self, _phase: Phase, _since: ()) {}

    fn accumulators(&self) -> Option<&TimingAccumulators> {
        None
    }

    fn total(&self) -> Option<Duration> {
        None
    }
}

/// Instrumentation backed by `Instant`.
#[derive(Clone, Debug)]
pub struct WallClockTiming {
    started: Instant,
    totals: TimingAccumulators,
}

impl WallClockTiming {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            totals: TimingAccumulators::default(),
        }
    }
}

impl Default for WallClockTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl Timing for WallClockTiming {
    type Mark = Instant;

    fn mark(&self) -> Instant {
        Instant::now()
    }

    fn record(&mut self, phase: Phase, since: Instant) {
        self.totals.add(phase, since.elapsed());
    }

    fn accumulators(&self) -> Option<&TimingAccumulators> {
        Some(&self.totals)
    }

    fn total(&self) -> Option<Duration> {
        Some(self.started.elapsed())
    }
}

/// End-of-run diagnostic summary.
pub struct TimingReport<'a> {
    pub totals: &'a TimingAccumulators,
    pub total: Duration,
    pub classification_fps: f64,
    pub source: &'a StreamInfo,
    /// Size of the media file on disk, when it is a file.
    pub source_bytes: Option<u64>,
}

impl TimingReport<'_> {
    pub fn lines(&self) -> Vec<String> {
        let t = self.totals;
        let mut lines = vec![
            format!(
                "classification took {:.1}s @ {} fps",
                self.total.as_secs_f64(),
                self.classification_fps
            ),
            format!(
                "  {:.2}s preprocessing and initialisation",
                t.preprocessing.as_secs_f64()
            ),
            format!("  {:.2}s processing, of which:", t.processing.as_secs_f64()),
            format!("    {:.2}s class prediction", t.detection.as_secs_f64()),
            format!(
                "    {:.2}s other processing",
                t.other_processing().as_secs_f64()
            ),
            format!("  {:.2}s postprocessing", t.postprocessing.as_secs_f64()),
        ];
        let mut source = match self.source.duration_secs() {
            Some(secs) => format!("source: {:.1}s", secs),
            None => "source: live".to_string(),
        };
        source.push_str(&format!(
            " @ {:.1} fps @ {}x{}",
            self.source.fps, self.source.width, self.source.height
        ));
        if let Some(bytes) = self.source_bytes {
            source.push_str(&format!(
                ", file size {:.1} MB",
                bytes as f64 / (1024.0 * 1024.0)
            ));
        }
        lines.push(source);
        lines
    }

    pub fn log(&self) {
        for line in self.lines() {
            log::info!("{}", line);
        }
    }
}
