//! Analysis results and the report emitted for each image.
//!
//! Every type here is built once by the analyzer and exposed read-only.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::catalog::HealthLabel;
use crate::engine::RawClassification;
use crate::error::{InferenceFailure, ScanError};
use crate::keypoint::KeypointSet;
use crate::quality::{PoseInterpreter, QualityGate, QualityLabel};

/// Outcome of the pose stage after quality assessment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoseResult {
    keypoints: KeypointSet,
    overall_confidence: f64,
    detected_count: usize,
    quality_label: QualityLabel,
    gate_passed: bool,
}

impl PoseResult {
    /// Derive counts, quality and gate decision from raw keypoints.
    pub fn assess(
        keypoints: KeypointSet,
        overall_confidence: f64,
        gate: &QualityGate,
        interpreter: &PoseInterpreter,
    ) -> Self {
        let detected_count = keypoints.detected_count(interpreter.keypoint_visibility());
        Self {
            quality_label: interpreter.classify_quality(overall_confidence, detected_count),
            gate_passed: gate.evaluate(overall_confidence, detected_count),
            keypoints,
            overall_confidence,
            detected_count,
        }
    }

    pub fn keypoints(&self) -> &KeypointSet {
        &self.keypoints
    }

    pub fn overall_confidence(&self) -> f64 {
        self.overall_confidence
    }

    pub fn detected_count(&self) -> usize {
        self.detected_count
    }

    pub fn quality_label(&self) -> QualityLabel {
        self.quality_label
    }

    pub fn gate_passed(&self) -> bool {
        self.gate_passed
    }
}

/// Validated classifier output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationResult {
    label: HealthLabel,
    confidence: f64,
    class_probabilities: BTreeMap<String, f64>,
}

impl ClassificationResult {
    pub fn from_raw(raw: RawClassification) -> Result<Self, InferenceFailure> {
        if raw.class_probabilities.is_empty() {
            return Err(InferenceFailure::NoProbabilities);
        }
        if !(0.0..=1.0).contains(&raw.confidence) {
            return Err(InferenceFailure::malformed(
                "classification",
                format!("confidence {} outside [0, 1]", raw.confidence),
            ));
        }
        Ok(Self {
            label: HealthLabel::new(&raw.label),
            confidence: raw.confidence,
            class_probabilities: raw.class_probabilities.into_iter().collect(),
        })
    }

    pub fn label(&self) -> &HealthLabel {
        &self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn class_probabilities(&self) -> &BTreeMap<String, f64> {
        &self.class_probabilities
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    FullBody,
    CloseUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    SequentialValidation,
    DirectClassification,
}

/// Why an analysis did or did not produce a complete assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    PoseFailed,
    InsufficientQuality,
    /// Kept in the status vocabulary for consumers; `analyze` reports the more
    /// specific `InsufficientQuality` when the gate blocks classification.
    ClassificationSkipped,
    ClassificationFailed,
    Complete,
}

/// State of the pose section of a report.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PoseOutcome {
    Detected(PoseResult),
    Failed { error: String },
    Skipped { note: String },
}

impl PoseOutcome {
    pub fn result(&self) -> Option<&PoseResult> {
        match self {
            PoseOutcome::Detected(pose) => Some(pose),
            _ => None,
        }
    }
}

/// Terminal output of one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub(crate) analysis_type: AnalysisType,
    pub(crate) mode: AnalysisMode,
    pub(crate) status: AnalysisStatus,
    /// Seconds since the Unix epoch.
    pub(crate) timestamp: f64,
    pub(crate) pose: PoseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) classification: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) combined_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) quality_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) primary_issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
    pub(crate) findings: Vec<String>,
    pub(crate) recommendations: Vec<String>,
}

impl AnalysisReport {
    pub fn analysis_type(&self) -> AnalysisType {
        self.analysis_type
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn pose(&self) -> &PoseOutcome {
        &self.pose
    }

    pub fn classification(&self) -> Option<&ClassificationResult> {
        self.classification.as_ref()
    }

    pub fn combined_confidence(&self) -> Option<f64> {
        self.combined_confidence
    }

    pub fn quality_threshold(&self) -> Option<f64> {
        self.quality_threshold
    }

    pub fn primary_issue(&self) -> Option<&str> {
        self.primary_issue.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Distinct findings in insertion order.
    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn is_complete(&self) -> bool {
        self.status == AnalysisStatus::Complete
    }
}

/// Arithmetic mean of the two stage confidences.
pub fn combined_confidence(pose_confidence: f64, classification_confidence: f64) -> f64 {
    (pose_confidence + classification_confidence) / 2.0
}

/// `{success: false, error, stage}` record for failures before analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub error: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// `{success: true, ...report}` record for a finished analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

/// One JSON record per analyzed image.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanOutput {
    Report(ReportEnvelope),
    Failure(FailureEnvelope),
}

impl ScanOutput {
    pub fn report(report: AnalysisReport, image: Option<&Path>) -> Self {
        ScanOutput::Report(ReportEnvelope {
            success: true,
            image: image.map(|p| p.display().to_string()),
            report,
        })
    }

    pub fn failure(err: &ScanError, image: Option<&Path>) -> Self {
        ScanOutput::Failure(FailureEnvelope {
            success: false,
            error: err.to_string(),
            stage: err.stage().to_string(),
            image: image.map(|p| p.display().to_string()),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutput::Report(_))
    }
}
