//! Frame loop driver.
//!
//! One frame is read, sampled or skipped, and (when sampled) run through
//! detect -> aggregate -> evaluate -> annotate before the next frame is read.
//! The source and sink are released after the loop on every exit path.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use crate::annotate::Annotator;
use crate::classify::{aggregate, Translator, Vocabulary};
use crate::condition::Condition;
use crate::detect::{DetectParams, Detection, DetectorBackend};
use crate::frame::{Frame, StreamInfo};
use crate::ingest::FrameSource;
use crate::sampler::SamplingState;
use crate::sink::{ForwardDecision, Forwarder, VideoSink};
use crate::timing::{Phase, Timing};
use crate::tracks::TrackLedger;

/// When to forward frames that meet the condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardPolicy {
    /// Forward the first qualifying frame, then end the run.
    #[default]
    FirstMatch,
    /// Forward every qualifying sampled frame and keep going.
    EveryMatch,
}

impl FromStr for ForwardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_match" => Ok(ForwardPolicy::FirstMatch),
            "every_match" => Ok(ForwardPolicy::EveryMatch),
            other => Err(format!(
                "unknown forward policy '{}' (expected first_match or every_match)",
                other
            )),
        }
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    PredictionBudget,
    EndOfStream,
    ReadFailure,
    ConditionMet,
    Interrupted,
}

/// Loop parameters, fixed for the lifetime of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub classification_fps: f64,
    pub max_predictions: u64,
    pub detect: DetectParams,
    pub create_bbox_frame: bool,
    pub forward_policy: ForwardPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classification_fps: 5.0,
            max_predictions: 50,
            detect: DetectParams::default(),
            create_bbox_frame: false,
            forward_policy: ForwardPolicy::default(),
        }
    }
}

/// Outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    pub source: StreamInfo,
    pub skip_factor: u64,
    pub frames_read: u64,
    pub predicted_frames: u64,
    /// Frame numbers submitted for detection.
    pub sampled_frames: Vec<u64>,
    /// Frame numbers whose counts met the condition.
    pub condition_met_frames: Vec<u64>,
    /// Frame numbers the forwarder accepted.
    pub forwarded_frames: Vec<u64>,
    pub stop_reason: StopReason,
    /// Verbatim copy of frame 0, when requested.
    pub bbox_frame: Option<Frame>,
    pub tracks: TrackLedger,
}

impl RunReport {
    fn new(source: StreamInfo, skip_factor: u64) -> Self {
        Self {
            source,
            skip_factor,
            frames_read: 0,
            predicted_frames: 0,
            sampled_frames: Vec::new(),
            condition_met_frames: Vec::new(),
            forwarded_frames: Vec::new(),
            stop_reason: StopReason::EndOfStream,
            bbox_frame: None,
            tracks: TrackLedger::new(),
        }
    }

    pub fn condition_met(&self) -> bool {
        !self.condition_met_frames.is_empty()
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    condition: Condition,
    translator: Translator,
    vocabulary: Vocabulary,
    annotator: Annotator,
    stop: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, condition: Condition) -> Self {
        if condition.is_never() {
            log::warn!("condition text did not parse; no frame will be forwarded");
        }
        Self {
            settings,
            condition,
            translator: Translator::new(),
            vocabulary: Vocabulary::new(),
            annotator: Annotator::new(),
            stop: None,
        }
    }

    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Stop gracefully before the next frame once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Drive the loop to completion and release `source` and `sink`.
    pub fn run<S, D, T>(
        &self,
        source: &mut S,
        detector: &mut D,
        mut sink: Option<&mut dyn VideoSink>,
        forwarder: &mut dyn Forwarder,
        timing: &mut T,
    ) -> RunReport
    where
        S: FrameSource + ?Sized,
        D: DetectorBackend + ?Sized,
        T: Timing,
    {
        let info = source.info();
        let mut state = SamplingState::from_rates(info.fps, self.settings.classification_fps);
        log::info!(
            "classifying frames with {}: source {:.2} fps, target {} fps, skip factor {}, condition '{}'",
            detector.name(),
            info.fps,
            self.settings.classification_fps,
            state.skip_factor,
            self.condition
        );
        if state.skip_factor == 0 {
            log::warn!("classification fps is not below source fps; no frame will be sampled");
        }

        let mut report = RunReport::new(info, state.skip_factor);

        let processing = timing.mark();
        report.stop_reason = self.drive(
            &mut state,
            &mut report,
            source,
            detector,
            &mut sink,
            forwarder,
            timing,
        );
        timing.record(Phase::Processing, processing);

        let postprocessing = timing.mark();
        source.release();
        if let Some(sink) = sink {
            if let Err(e) = sink.release() {
                log::warn!("failed to release frame writer: {:#}", e);
            }
        }
        timing.record(Phase::Postprocessing, postprocessing);

        report.frames_read = state.frame_number;
        report.predicted_frames = state.predicted_frames;
        log::info!(
            "run finished ({:?}): {} frames read, {} predicted, {} forwarded",
            report.stop_reason,
            report.frames_read,
            report.predicted_frames,
            report.forwarded_frames.len()
        );
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn drive<S, D, T>(
        &self,
        state: &mut SamplingState,
        report: &mut RunReport,
        source: &mut S,
        detector: &mut D,
        sink: &mut Option<&mut dyn VideoSink>,
        forwarder: &mut dyn Forwarder,
        timing: &mut T,
    ) -> StopReason
    where
        S: FrameSource + ?Sized,
        D: DetectorBackend + ?Sized,
        T: Timing,
    {
        let frame_count = report.source.frame_count;
        loop {
            if !state.has_budget(self.settings.max_predictions, frame_count) {
                return if state.predicted_frames >= self.settings.max_predictions {
                    StopReason::PredictionBudget
                } else {
                    StopReason::EndOfStream
                };
            }
            if self.stop_requested() {
                log::info!("stop requested at frame {}", state.frame_number);
                return StopReason::Interrupted;
            }

            let mut frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::info!("no frame at {}: {:#}", state.frame_number, e);
                    return StopReason::ReadFailure;
                }
            };
            frame.index = state.frame_number;

            if self.settings.create_bbox_frame && state.frame_number == 0 {
                report.bbox_frame = Some(frame.clone());
            }

            if !state.should_sample() {
                state.advance();
                continue;
            }

            let mark = timing.mark();
            let detections = match detector.detect(&frame, &self.settings.detect) {
                Ok(detections) => detections,
                Err(e) => {
                    log::warn!("detector failed on frame {}: {:#}", state.frame_number, e);
                    Vec::new()
                }
            };
            timing.record(Phase::Detection, mark);

            state.record_prediction();
            report.sampled_frames.push(state.frame_number);
            let met = self.process(frame, &detections, sink, forwarder, report);
            state.advance();

            if met && self.settings.forward_policy == ForwardPolicy::FirstMatch {
                return StopReason::ConditionMet;
            }
        }
    }

    /// Count, decide and annotate one sampled frame. Returns whether the
    /// condition was met.
    fn process(
        &self,
        frame: Frame,
        detections: &[Detection],
        sink: &mut Option<&mut dyn VideoSink>,
        forwarder: &mut dyn Forwarder,
        report: &mut RunReport,
    ) -> bool {
        let frame_number = frame.index;
        let counts = aggregate(detections, &self.translator, &self.vocabulary);
        report.tracks.observe(detections, &self.translator);
        let met = self.condition.evaluate(&counts);

        if let Some(sink) = sink.as_mut() {
            let annotated = self.annotator.annotate(&frame, detections, &self.translator);
            if let Err(e) = sink.write(&annotated.image) {
                log::warn!("failed to write frame {}: {:#}", frame_number, e);
            }
        }

        if !met {
            log::info!("Condition not met, not forwarding video to remote vault");
            return false;
        }

        report.condition_met_frames.push(frame_number);
        let decision = ForwardDecision {
            frame_number,
            counts,
            frame,
        };
        match forwarder.forward(&decision) {
            Ok(()) => report.forwarded_frames.push(frame_number),
            Err(e) => log::error!("forwarding frame {} failed: {:#}", frame_number, e),
        }
        true
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ScriptedBackend};
    use crate::timing::{NoTiming, WallClockTiming};
    use anyhow::{bail, Result};
    use image::RgbImage;
    use std::collections::HashMap;

    struct VecSource {
        info: StreamInfo,
        next: u64,
        fail_at: Option<u64>,
        released: bool,
    }

    impl VecSource {
        fn new(fps: f64, frames: u64) -> Self {
            Self {
                info: StreamInfo {
                    fps,
                    frame_count: Some(frames),
                    width: 8,
                    height: 8,
                },
                next: 0,
                fail_at: None,
                released: false,
            }
        }
    }

    impl FrameSource for VecSource {
        fn info(&self) -> StreamInfo {
            self.info.clone()
        }

        fn next_frame(&mut self) -> Result<Frame> {
            if self.fail_at == Some(self.next) {
                bail!("read failed");
            }
            let frame = Frame::new(self.next, RgbImage::new(8, 8));
            self.next += 1;
            Ok(frame)
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<u64>);

    impl Forwarder for Recorder {
        fn forward(&mut self, decision: &ForwardDecision) -> Result<()> {
            self.0.push(decision.frame_number);
            Ok(())
        }
    }

    fn pedestrians(n: u64) -> Vec<Detection> {
        (0..n)
            .map(|id| Detection::tracked("person", BoundingBox::new(0.0, 0.0, 4.0, 4.0), id))
            .collect()
    }

    fn settings(policy: ForwardPolicy) -> PipelineSettings {
        PipelineSettings {
            classification_fps: 10.0,
            max_predictions: 100,
            forward_policy: policy,
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn samples_every_third_frame_and_releases_source() {
        let pipeline = Pipeline::new(
            settings(ForwardPolicy::EveryMatch),
            Condition::parse("5 persons detected"),
        );
        let mut source = VecSource::new(30.0, 10);
        let mut detector = ScriptedBackend::default();

        let report = pipeline.run(
            &mut source,
            &mut detector,
            None,
            &mut Recorder::default(),
            &mut NoTiming,
        );

        assert_eq!(report.skip_factor, 3);
        assert_eq!(detector.calls(), &[3, 6, 9]);
        assert_eq!(report.sampled_frames, vec![3, 6, 9]);
        assert_eq!(report.frames_read, 10);
        assert_eq!(report.stop_reason, StopReason::EndOfStream);
        assert!(source.released);
    }

    #[test]
    fn first_match_stops_after_one_forward() {
        let frames: HashMap<u64, Vec<Detection>> =
            [(3, pedestrians(6)), (6, pedestrians(6))].into_iter().collect();
        let pipeline = Pipeline::new(
            settings(ForwardPolicy::FirstMatch),
            Condition::parse("5 persons detected"),
        );
        let mut source = VecSource::new(30.0, 10);
        let mut detector = ScriptedBackend::from_frames(frames);
        let mut forwarder = Recorder::default();

        let report = pipeline.run(
            &mut source,
            &mut detector,
            None,
            &mut forwarder,
            &mut NoTiming,
        );

        assert_eq!(forwarder.0, vec![3]);
        assert_eq!(report.stop_reason, StopReason::ConditionMet);
        assert_eq!(report.frames_read, 4);
        assert!(source.released);
    }

    #[test]
    fn read_failure_ends_the_run_gracefully() {
        let pipeline = Pipeline::new(settings(ForwardPolicy::EveryMatch), Condition::Never);
        let mut source = VecSource::new(30.0, 100);
        source.fail_at = Some(5);
        let mut detector = ScriptedBackend::default();

        let report = pipeline.run(
            &mut source,
            &mut detector,
            None,
            &mut Recorder::default(),
            &mut NoTiming,
        );

        assert_eq!(report.stop_reason, StopReason::ReadFailure);
        assert_eq!(report.frames_read, 5);
        assert_eq!(detector.calls(), &[3]);
        assert!(source.released);
    }

    #[test]
    fn stop_flag_interrupts_before_reading() {
        let flag = Arc::new(AtomicBool::new(true));
        let pipeline = Pipeline::new(settings(ForwardPolicy::EveryMatch), Condition::Never)
            .with_stop_flag(flag);
        let mut source = VecSource::new(30.0, 100);

        let report = pipeline.run(
            &mut source,
            &mut ScriptedBackend::default(),
            None,
            &mut Recorder::default(),
            &mut NoTiming,
        );

        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.frames_read, 0);
        assert!(source.released);
    }

    #[test]
    fn bbox_frame_keeps_frame_zero() {
        let pipeline = Pipeline::new(
            PipelineSettings {
                create_bbox_frame: true,
                ..settings(ForwardPolicy::EveryMatch)
            },
            Condition::Never,
        );
        let mut source = VecSource::new(30.0, 4);

        let report = pipeline.run(
            &mut source,
            &mut ScriptedBackend::default(),
            None,
            &mut Recorder::default(),
            &mut NoTiming,
        );

        assert_eq!(report.bbox_frame.map(|frame| frame.index), Some(0));
    }

    #[test]
    fn timing_does_not_change_outcome() {
        let frames: HashMap<u64, Vec<Detection>> = [(3, pedestrians(6))].into_iter().collect();
        let pipeline = Pipeline::new(
            settings(ForwardPolicy::EveryMatch),
            Condition::parse("5 persons detected"),
        );

        let untimed = pipeline.run(
            &mut VecSource::new(30.0, 10),
            &mut ScriptedBackend::from_frames(frames.clone()),
            None,
            &mut Recorder::default(),
            &mut NoTiming,
        );
        let mut timing = WallClockTiming::new();
        let timed = pipeline.run(
            &mut VecSource::new(30.0, 10),
            &mut ScriptedBackend::from_frames(frames),
            None,
            &mut Recorder::default(),
            &mut timing,
        );

        assert_eq!(untimed.forwarded_frames, timed.forwarded_frames);
        assert_eq!(untimed.sampled_frames, timed.sampled_frames);
        let totals = timing.accumulators().unwrap();
        assert!(totals.processing >= totals.detection);
    }

    #[test]
    fn forward_policy_parses_both_spellings() {
        assert_eq!(
            "first-match".parse::<ForwardPolicy>(),
            Ok(ForwardPolicy::FirstMatch)
        );
        assert_eq!(
            "EVERY_MATCH".parse::<ForwardPolicy>(),
            Ok(ForwardPolicy::EveryMatch)
        );
        assert!("sometimes".parse::<ForwardPolicy>().is_err());
    }
}
