use vault_forwarder::{
    Condition, ForwardDecision, ForwardPolicy, Forwarder, FrameDirSink, NoTiming, Pipeline,
    PipelineSettings, ScriptedBackend, SourceConfig, StopReason, VideoSink, VideoSource,
};

/// Six tracked pedestrians on frames 3, 6 and 9; a car pair on frame 6.
const SCRIPT: &str = r#"{
    "frames": {
        "3": [
            {"class": "person", "box": {"x_min": 1, "y_min": 1, "x_max": 9, "y_max": 9}, "id": 1},
            {"class": "person", "box": {"x_min": 10, "y_min": 1, "x_max": 19, "y_max": 9}, "id": 2},
            {"class": "person", "box": {"x_min": 20, "y_min": 1, "x_max": 29, "y_max": 9}, "id": 3},
            {"class": "person", "box": {"x_min": 30, "y_min": 1, "x_max": 39, "y_max": 9}, "id": 4},
            {"class": "person", "box": {"x_min": 40, "y_min": 1, "x_max": 49, "y_max": 9}, "id": 5},
            {"class": "person", "box": {"x_min": 50, "y_min": 1, "x_max": 59, "y_max": 9}, "id": 6}
        ],
        "6": [
            {"class": "person", "box": {"x_min": 1, "y_min": 1, "x_max": 9, "y_max": 9}, "id": 1},
            {"class": "person", "box": {"x_min": 10, "y_min": 1, "x_max": 19, "y_max": 9}, "id": 2},
            {"class": "person", "box": {"x_min": 20, "y_min": 1, "x_max": 29, "y_max": 9}, "id": 3},
            {"class": "person", "box": {"x_min": 30, "y_min": 1, "x_max": 39, "y_max": 9}, "id": 4},
            {"class": "person", "box": {"x_min": 40, "y_min": 1, "x_max": 49, "y_max": 9}, "id": 5},
            {"class": "person", "box": {"x_min": 50, "y_min": 1, "x_max": 59, "y_max": 9}, "id": 7},
            {"class": "car", "box": {"x_min": 1, "y_min": 20, "x_max": 30, "y_max": 40}, "id": 8},
            {"class": "car", "box": {"x_min": 31, "y_min": 20, "x_max": 60, "y_max": 40}, "id": 9}
        ],
        "9": [
            {"class": "person", "box": {"x_min": 1, "y_min": 1, "x_max": 9, "y_max": 9}, "id": 1},
            {"class": "person", "box": {"x_min": 10, "y_min": 1, "x_max": 19, "y_max": 9}, "id": 2},
            {"class": "person", "box": {"x_min": 20, "y_min": 1, "x_max": 29, "y_max": 9}, "id": 3},
            {"class": "person", "box": {"x_min": 30, "y_min": 1, "x_max": 39, "y_max": 9}, "id": 4},
            {"class": "person", "box": {"x_min": 40, "y_min": 1, "x_max": 49, "y_max": 9}, "id": 5},
            {"class": "person", "box": {"x_min": 50, "y_min": 1, "x_max": 59, "y_max": 9}, "id": 6}
        ]
    }
}"#;

#[derive(Default)]
struct Vault {
    received: Vec<u64>,
}

impl Forwarder for Vault {
    fn forward(&mut self, decision: &ForwardDecision) -> anyhow::Result<()> {
        assert!(decision.counts.get("persons").unwrap_or(0) >= 5);
        self.received.push(decision.frame_number);
        Ok(())
    }
}

fn stub_source(frames: u64) -> VideoSource {
    let mut source = VideoSource::new(SourceConfig {
        path: "stub://lobby".to_string(),
        nominal_fps: 30.0,
        synthetic_frames: frames,
        width: 64,
        height: 48,
    })
    .unwrap();
    source.connect().unwrap();
    source
}

fn settings(classification_fps: f64, max_predictions: u64, policy: ForwardPolicy) -> PipelineSettings {
    PipelineSettings {
        classification_fps,
        max_predictions,
        forward_policy: policy,
        ..PipelineSettings::default()
    }
}

#[test]
fn first_match_forwards_once_and_stops() {
    let pipeline = Pipeline::new(
        settings(10.0, 50, ForwardPolicy::FirstMatch),
        Condition::parse("5 persons detected"),
    );
    let mut source = stub_source(10);
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();
    let mut vault = Vault::default();

    let report = pipeline.run(&mut source, &mut detector, None, &mut vault, &mut NoTiming);

    assert_eq!(vault.received, vec![3]);
    assert_eq!(report.forwarded_frames, vec![3]);
    assert_eq!(report.stop_reason, StopReason::ConditionMet);
    assert_eq!(detector.calls(), &[3]);
    assert!(source.is_released());
    assert_eq!(source.stats().frames_read, 4);
}

#[test]
fn every_match_forwards_each_qualifying_frame() {
    let pipeline = Pipeline::new(
        settings(10.0, 50, ForwardPolicy::EveryMatch),
        Condition::parse("5 persons detected"),
    );
    let mut source = stub_source(10);
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();
    let mut vault = Vault::default();

    let report = pipeline.run(&mut source, &mut detector, None, &mut vault, &mut NoTiming);

    assert_eq!(vault.received, vec![3, 6, 9]);
    assert_eq!(report.condition_met_frames, vec![3, 6, 9]);
    assert_eq!(report.stop_reason, StopReason::EndOfStream);
    assert_eq!(report.frames_read, 10);

    let distinct: Vec<(&str, usize)> = report.tracks.distinct().collect();
    assert_eq!(distinct, vec![("car", 2), ("pedestrian", 7)]);
}

#[test]
fn car_condition_matches_only_frame_six() {
    let pipeline = Pipeline::new(
        settings(10.0, 50, ForwardPolicy::EveryMatch),
        Condition::parse("2 cars detected"),
    );
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();

    let report = pipeline.run(
        &mut stub_source(10),
        &mut detector,
        None,
        &mut vault_forwarder::LogForwarder::new(),
        &mut NoTiming,
    );

    assert_eq!(report.condition_met_frames, vec![6]);
}

#[test]
fn prediction_budget_caps_detector_calls() {
    let pipeline = Pipeline::new(
        settings(10.0, 2, ForwardPolicy::EveryMatch),
        Condition::parse("50 persons detected"),
    );
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();

    let report = pipeline.run(
        &mut stub_source(30),
        &mut detector,
        None,
        &mut Vault::default(),
        &mut NoTiming,
    );

    assert_eq!(detector.calls(), &[3, 6]);
    assert_eq!(report.predicted_frames, 2);
    assert_eq!(report.stop_reason, StopReason::PredictionBudget);
    assert!(!report.condition_met());
}

#[test]
fn target_rate_above_source_rate_samples_nothing() {
    let pipeline = Pipeline::new(
        settings(60.0, 50, ForwardPolicy::EveryMatch),
        Condition::parse("1 persons detected"),
    );
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();

    let report = pipeline.run(
        &mut stub_source(10),
        &mut detector,
        None,
        &mut Vault::default(),
        &mut NoTiming,
    );

    assert_eq!(report.skip_factor, 0);
    assert!(detector.calls().is_empty());
    assert_eq!(report.frames_read, 10);
    assert_eq!(report.stop_reason, StopReason::EndOfStream);
}

#[test]
fn annotated_frames_are_written_for_each_sampled_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FrameDirSink::create(dir.path().join("annotated")).unwrap();
    let pipeline = Pipeline::new(
        settings(10.0, 50, ForwardPolicy::EveryMatch),
        Condition::parse("5 persons detected"),
    );
    let mut detector = ScriptedBackend::from_json(SCRIPT).unwrap();

    pipeline.run(
        &mut stub_source(10),
        &mut detector,
        Some(&mut sink as &mut dyn VideoSink),
        &mut Vault::default(),
        &mut NoTiming,
    );

    assert_eq!(sink.written(), 3);
    for n in 0..3 {
        assert!(sink.dir().join(format!("frame_{:06}.jpg", n)).is_file());
    }
}
