use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::detect::DetectParams;
use crate::ingest::SourceConfig;
use crate::pipeline::{ForwardPolicy, PipelineSettings};

const DEFAULT_MEDIA_PATH: &str = "stub://front_camera";
const DEFAULT_CONDITION: &str = "5 persons detected";
const DEFAULT_CLASSIFICATION_FPS: f64 = 5.0;
const DEFAULT_CLASSIFICATION_THRESHOLD: f32 = 0.3;
const DEFAULT_MAX_PREDICTIONS: u64 = 50;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_SOURCE_FPS: f64 = 30.0;
const DEFAULT_SYNTHETIC_FRAMES: u64 = 300;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct ForwarderConfigFile {
    media_path: Option<String>,
    output_path: Option<PathBuf>,
    condition: Option<String>,
    forward_policy: Option<ForwardPolicy>,
    time_verbose: Option<bool>,
    save_video: Option<bool>,
    create_bbox_frame: Option<bool>,
    classification: Option<ClassificationConfigFile>,
    detector: Option<DetectorConfigFile>,
    source: Option<SourceConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    translations: Option<BTreeMap<String, String>>,
    categories: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassificationConfigFile {
    fps: Option<f64>,
    threshold: Option<f32>,
    max_predictions: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    name: Option<String>,
    detections_path: Option<PathBuf>,
    persist: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    fps: Option<f64>,
    frames: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    font_path: Option<PathBuf>,
}

/// Run configuration. Built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwarderConfig {
    pub media_path: String,
    /// Directory for annotated frames and the reference frame.
    pub output_path: Option<PathBuf>,
    pub condition: String,
    pub forward_policy: ForwardPolicy,
    pub time_verbose: bool,
    pub save_video: bool,
    pub create_bbox_frame: bool,
    pub classification: ClassificationSettings,
    pub detector: DetectorSettings,
    pub source: SourceSettings,
    pub font_path: Option<PathBuf>,
    /// Raw label -> object name overrides.
    pub translations: BTreeMap<String, String>,
    /// Extra category -> object name entries.
    pub categories: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSettings {
    pub fps: f64,
    pub threshold: f32,
    pub max_predictions: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub name: String,
    pub detections_path: Option<PathBuf>,
    pub persist: bool,
}

/// Values reported by sources that carry no metadata of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub fps: f64,
    pub frames: u64,
    pub width: u32,
    pub height: u32,
}

impl ForwarderConfig {
    /// Load from the file named by `FORWARDER_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = env_string("FORWARDER_CONFIG").map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let cfg = Self::load_layers(config_path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults, file and environment, without validation. Callers that
    /// layer further overrides on top must call [`ForwarderConfig::validate`].
    pub fn load_layers(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: ForwarderConfigFile) -> Self {
        let classification = file.classification.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        Self {
            media_path: file
                .media_path
                .unwrap_or_else(|| DEFAULT_MEDIA_PATH.to_string()),
            output_path: file.output_path,
            condition: file
                .condition
                .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            forward_policy: file.forward_policy.unwrap_or_default(),
            time_verbose: file.time_verbose.unwrap_or(false),
            save_video: file.save_video.unwrap_or(false),
            create_bbox_frame: file.create_bbox_frame.unwrap_or(false),
            classification: ClassificationSettings {
                fps: classification.fps.unwrap_or(DEFAULT_CLASSIFICATION_FPS),
                threshold: classification
                    .threshold
                    .unwrap_or(DEFAULT_CLASSIFICATION_THRESHOLD),
                max_predictions: classification
                    .max_predictions
                    .unwrap_or(DEFAULT_MAX_PREDICTIONS),
            },
            detector: DetectorSettings {
                name: detector
                    .name
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                detections_path: detector.detections_path,
                persist: detector.persist.unwrap_or(true),
            },
            source: SourceSettings {
                fps: source.fps.unwrap_or(DEFAULT_SOURCE_FPS),
                frames: source.frames.unwrap_or(DEFAULT_SYNTHETIC_FRAMES),
                width: source.width.unwrap_or(DEFAULT_WIDTH),
                height: source.height.unwrap_or(DEFAULT_HEIGHT),
            },
            font_path: file.annotate.and_then(|annotate| annotate.font_path),
            translations: file.translations.unwrap_or_default(),
            categories: file.categories.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_string("FORWARDER_MEDIA_PATH") {
            self.media_path = path;
        }
        if let Some(path) = env_string("FORWARDER_OUTPUT_PATH") {
            self.output_path = Some(PathBuf::from(path));
        }
        if let Some(condition) = env_string("FORWARDER_CONDITION") {
            self.condition = condition;
        }
        if let Some(policy) = env_string("FORWARDER_FORWARD_POLICY") {
            self.forward_policy = policy
                .parse()
                .map_err(|e: String| anyhow!("FORWARDER_FORWARD_POLICY: {}", e))?;
        }
        if let Some(fps) = env_string("FORWARDER_CLASSIFICATION_FPS") {
            self.classification.fps = fps
                .parse()
                .map_err(|_| anyhow!("FORWARDER_CLASSIFICATION_FPS must be a number"))?;
        }
        if let Some(threshold) = env_string("FORWARDER_CLASSIFICATION_THRESHOLD") {
            self.classification.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("FORWARDER_CLASSIFICATION_THRESHOLD must be a number"))?;
        }
        if let Some(max) = env_string("FORWARDER_MAX_PREDICTIONS") {
            self.classification.max_predictions = max
                .parse()
                .map_err(|_| anyhow!("FORWARDER_MAX_PREDICTIONS must be a non-negative integer"))?;
        }
        if let Some(flag) = env_flag("FORWARDER_TIME_VERBOSE")? {
            self.time_verbose = flag;
        }
        if let Some(flag) = env_flag("FORWARDER_SAVE_VIDEO")? {
            self.save_video = flag;
        }
        if let Some(flag) = env_flag("FORWARDER_CREATE_BBOX_FRAME")? {
            self.create_bbox_frame = flag;
        }
        if let Some(name) = env_string("FORWARDER_DETECTOR") {
            self.detector.name = name;
        }
        if let Some(path) = env_string("FORWARDER_DETECTIONS_PATH") {
            self.detector.detections_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_string("FORWARDER_FONT_PATH") {
            self.font_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.media_path.trim().is_empty() {
            return Err(anyhow!("media path must not be empty"));
        }
        if !(self.classification.fps.is_finite() && self.classification.fps > 0.0) {
            return Err(anyhow!("classification fps must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.classification.threshold) {
            return Err(anyhow!("classification threshold must be within 0..=1"));
        }
        if self.classification.max_predictions == 0 {
            return Err(anyhow!("max predictions must be greater than zero"));
        }
        if self.save_video && self.output_path.is_none() {
            return Err(anyhow!("save_video requires an output path"));
        }
        if self.detector.name == "scripted" && self.detector.detections_path.is_none() {
            return Err(anyhow!("the scripted detector requires a detections path"));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            classification_fps: self.classification.fps,
            max_predictions: self.classification.max_predictions,
            detect: DetectParams {
                confidence: self.classification.threshold,
                persist: self.detector.persist,
            },
            create_bbox_frame: self.create_bbox_frame,
            forward_policy: self.forward_policy,
        }
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            path: self.media_path.clone(),
            nominal_fps: self.source.fps,
            synthetic_frames: self.source.frames,
            width: self.source.width,
            height: self.source.height,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ForwarderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_flag(key: &str) -> Result<Option<bool>> {
    let Some(value) = env_string(key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(anyhow!("{} must be true or false", key)),
    }
}
