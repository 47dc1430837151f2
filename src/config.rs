use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::keypoint::LANDMARK_COUNT;
use crate::quality::{
    AnomalyThresholds, GateThresholds, DEFAULT_KEYPOINT_VISIBILITY, DEFAULT_LEG_OFFSET_PX,
    DEFAULT_MIN_KEYPOINTS_DETECTED, DEFAULT_POSE_CONFIDENCE_THRESHOLD, DEFAULT_WING_ASYMMETRY_PX,
};

const DEFAULT_POSE_INPUT_SIZE: u32 = 640;
const DEFAULT_CLASSIFIER_INPUT_SIZE: u32 = 224;
const MAX_INPUT_SIZE: u32 = 4096;
// Classifier output order (alphabetical, as exported by the training pipeline).
const DEFAULT_CLASS_LABELS: [&str; 5] = [
    "bumblefoot",
    "comb_injury",
    "feather_loss",
    "healthy",
    "wing_injury",
];

pub const ENV_CONFIG: &str = "ROOSTERSCAN_CONFIG";
pub const ENV_POSE_CONFIDENCE_THRESHOLD: &str = "ROOSTERSCAN_POSE_CONFIDENCE_THRESHOLD";
pub const ENV_MIN_KEYPOINTS: &str = "ROOSTERSCAN_MIN_KEYPOINTS";
pub const ENV_CLASS_LABELS: &str = "ROOSTERSCAN_CLASS_LABELS";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnalyzerConfigFile {
    gate: Option<GateConfigFile>,
    pose: Option<PoseConfigFile>,
    models: Option<ModelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GateConfigFile {
    pose_confidence_threshold: Option<f64>,
    min_keypoints_detected: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PoseConfigFile {
    keypoint_visibility: Option<f32>,
    wing_asymmetry_px: Option<f32>,
    leg_offset_px: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    pose_input_size: Option<u32>,
    classifier_input_size: Option<u32>,
    class_labels: Option<Vec<String>>,
}

/// Analyzer configuration: gate thresholds, geometry limits and model settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub gate: GateThresholds,
    pub anomalies: AnomalyThresholds,
    pub models: ModelSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Square input edge for the pose model.
    pub pose_input_size: u32,
    /// Square input edge for the classifier.
    pub classifier_input_size: u32,
    /// Classifier labels in model output order.
    pub class_labels: Vec<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            pose_input_size: DEFAULT_POSE_INPUT_SIZE,
            classifier_input_size: DEFAULT_CLASSIFIER_INPUT_SIZE,
            class_labels: DEFAULT_CLASS_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            gate: GateThresholds::default(),
            anomalies: AnomalyThresholds::default(),
            models: ModelSettings::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from `$ROOSTERSCAN_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(ENV_CONFIG).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply command-line threshold overrides and re-validate.
    pub fn with_overrides(
        mut self,
        pose_confidence_threshold: Option<f64>,
        min_keypoints_detected: Option<usize>,
    ) -> Result<Self> {
        if let Some(threshold) = pose_confidence_threshold {
            self.gate.pose_confidence = threshold;
        }
        if let Some(min) = min_keypoints_detected {
            self.gate.min_keypoints = min;
        }
        self.validate()?;
        Ok(self)
    }

    fn from_file(file: AnalyzerConfigFile) -> Self {
        let gate = file.gate.unwrap_or_default();
        let pose = file.pose.unwrap_or_default();
        let models = file.models.unwrap_or_default();
        let defaults = ModelSettings::default();
        Self {
            gate: GateThresholds {
                pose_confidence: gate
                    .pose_confidence_threshold
                    .unwrap_or(DEFAULT_POSE_CONFIDENCE_THRESHOLD),
                min_keypoints: gate
                    .min_keypoints_detected
                    .unwrap_or(DEFAULT_MIN_KEYPOINTS_DETECTED),
            },
            anomalies: AnomalyThresholds {
                keypoint_visibility: pose
                    .keypoint_visibility
                    .unwrap_or(DEFAULT_KEYPOINT_VISIBILITY),
                wing_asymmetry_px: pose.wing_asymmetry_px.unwrap_or(DEFAULT_WING_ASYMMETRY_PX),
                leg_offset_px: pose.leg_offset_px.unwrap_or(DEFAULT_LEG_OFFSET_PX),
            },
            models: ModelSettings {
                pose_input_size: models.pose_input_size.unwrap_or(defaults.pose_input_size),
                classifier_input_size: models
                    .classifier_input_size
                    .unwrap_or(defaults.classifier_input_size),
                class_labels: models.class_labels.unwrap_or(defaults.class_labels),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var(ENV_POSE_CONFIDENCE_THRESHOLD) {
            if !threshold.trim().is_empty() {
                self.gate.pose_confidence = threshold.trim().parse().map_err(|_| {
                    anyhow!("{} must be a number between 0 and 1", ENV_POSE_CONFIDENCE_THRESHOLD)
                })?;
            }
        }
        if let Ok(min) = std::env::var(ENV_MIN_KEYPOINTS) {
            if !min.trim().is_empty() {
                self.gate.min_keypoints = min
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("{} must be a non-negative integer", ENV_MIN_KEYPOINTS))?;
            }
        }
        if let Ok(labels) = std::env::var(ENV_CLASS_LABELS) {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.models.class_labels = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.gate.pose_confidence;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "pose confidence threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.gate.min_keypoints > LANDMARK_COUNT {
            return Err(anyhow!(
                "min keypoints {} exceeds the {} landmark schema",
                self.gate.min_keypoints,
                LANDMARK_COUNT
            ));
        }
        if !(0.0..=1.0).contains(&self.anomalies.keypoint_visibility) {
            return Err(anyhow!("keypoint visibility must be within [0, 1]"));
        }
        for (name, value) in [
            ("wing asymmetry", self.anomalies.wing_asymmetry_px),
            ("leg offset", self.anomalies.leg_offset_px),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} limit must be a positive pixel count", name));
            }
        }
        for (name, size) in [
            ("pose", self.models.pose_input_size),
            ("classifier", self.models.classifier_input_size),
        ] {
            if size == 0 || size > MAX_INPUT_SIZE {
                return Err(anyhow!(
                    "{} input size must be within 1..={}, got {}",
                    name,
                    MAX_INPUT_SIZE,
                    size
                ));
            }
        }
        let labels = &self.models.class_labels;
        if labels.is_empty() || labels.iter().any(|l| l.trim().is_empty()) {
            return Err(anyhow!("class labels must be non-empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(anyhow!("duplicate class label '{}'", label));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AnalyzerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
