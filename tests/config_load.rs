use std::sync::Mutex;

use tempfile::NamedTempFile;

use vault_forwarder::config::ForwarderConfig;
use vault_forwarder::ForwardPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FORWARDER_CONFIG",
        "FORWARDER_MEDIA_PATH",
        "FORWARDER_OUTPUT_PATH",
        "FORWARDER_CLASSIFICATION_FPS",
        "FORWARDER_CLASSIFICATION_THRESHOLD",
        "FORWARDER_MAX_PREDICTIONS",
        "FORWARDER_CONDITION",
        "FORWARDER_FORWARD_POLICY",
        "FORWARDER_TIME_VERBOSE",
        "FORWARDER_SAVE_VIDEO",
        "FORWARDER_CREATE_BBOX_FRAME",
        "FORWARDER_DETECTOR",
        "FORWARDER_DETECTIONS_PATH",
        "FORWARDER_FONT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "media_path": "/srv/clips/lobby.mp4",
        "output_path": "/tmp/forwarder-out",
        "condition": "3 cars detected",
        "save_video": true,
        "classification": {
            "fps": 2.0,
            "threshold": 0.5,
            "max_predictions": 20
        },
        "source": {
            "fps": 25.0,
            "frames": 100
        },
        "translations": {
            "van": "car"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FORWARDER_CONFIG", file.path());
    std::env::set_var("FORWARDER_CONDITION", "2 persons detected");
    std::env::set_var("FORWARDER_FORWARD_POLICY", "every-match");
    std::env::set_var("FORWARDER_TIME_VERBOSE", "yes");

    let cfg = ForwarderConfig::load().expect("load config");

    assert_eq!(cfg.media_path, "/srv/clips/lobby.mp4");
    assert_eq!(cfg.condition, "2 persons detected");
    assert_eq!(cfg.forward_policy, ForwardPolicy::EveryMatch);
    assert!(cfg.time_verbose);
    assert!(cfg.save_video);
    assert_eq!(cfg.classification.fps, 2.0);
    assert_eq!(cfg.classification.threshold, 0.5);
    assert_eq!(cfg.classification.max_predictions, 20);
    assert_eq!(cfg.source.fps, 25.0);
    assert_eq!(cfg.source.frames, 100);
    assert_eq!(cfg.translations.get("van").map(String::as_str), Some("car"));

    let settings = cfg.pipeline_settings();
    assert_eq!(settings.detect.confidence, 0.5);
    assert_eq!(settings.forward_policy, ForwardPolicy::EveryMatch);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ForwarderConfig::load().expect("load defaults");
    assert_eq!(cfg.media_path, "stub://front_camera");
    assert_eq!(cfg.condition, "5 persons detected");
    assert_eq!(cfg.forward_policy, ForwardPolicy::FirstMatch);
    assert_eq!(cfg.detector.name, "stub");
    assert!(!cfg.time_verbose);

    clear_env();
}

#[test]
fn toml_config_is_read_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        media_path = "stub://yard"
        create_bbox_frame = true

        [detector]
        name = "stub"
        persist = false
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = ForwarderConfig::load_from(Some(file.path())).expect("load toml");
    assert_eq!(cfg.media_path, "stub://yard");
    assert!(cfg.create_bbox_frame);
    assert!(!cfg.detector.persist);

    clear_env();
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FORWARDER_FORWARD_POLICY", "sometimes");
    assert!(ForwarderConfig::load().is_err());
    clear_env();

    std::env::set_var("FORWARDER_CLASSIFICATION_FPS", "fast");
    assert!(ForwarderConfig::load().is_err());
    clear_env();

    std::env::set_var("FORWARDER_SAVE_VIDEO", "maybe");
    assert!(ForwarderConfig::load().is_err());
    clear_env();

    std::env::set_var("FORWARDER_DETECTOR", "scripted");
    let err = ForwarderConfig::load().unwrap_err();
    assert!(err.to_string().contains("detections path"));

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FORWARDER_CONFIG", "/nonexistent/forwarder.json");
    let err = ForwarderConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}

#[test]
fn later_overrides_can_satisfy_constraints_before_validation() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FORWARDER_SAVE_VIDEO", "true");
    assert!(ForwarderConfig::load_from(None).is_err());

    let mut cfg = ForwarderConfig::load_layers(None).expect("load layers");
    assert!(cfg.save_video);
    assert!(cfg.validate().is_err());

    cfg.output_path = Some(std::path::PathBuf::from("out"));
    cfg.validate().expect("output path satisfies save_video");

    clear_env();
}
