//! Sequential analysis: pose inference, quality gate, classification.
//!
//! ```text
//! INIT -> POSE_INFERRED -> GATED_PASS -> CLASSIFIED -> DONE
//!                       \-> GATED_FAIL -> SKIPPED ----/
//!      \-> (pose failed) -> DIRECT_CLASSIFIED -------> DONE
//! ```
//!
//! Inference failures never escape `analyze`; they become a report status plus an
//! error string. The classification engine is only called when the gate passes, or
//! directly when the pose stage produced nothing usable.

use std::path::Path;

use crate::catalog::{Assessment, RecommendationCatalog};
use crate::config::AnalyzerConfig;
use crate::engine::{load_engines, ClassificationEngine, Engines, PoseEngine};
use crate::error::{InferenceFailure, ModelLoadError};
use crate::input::AnalysisImage;
use crate::keypoint::{KeypointSet, LANDMARK_COUNT};
use crate::quality::{PoseInterpreter, QualityGate};
use crate::report::{
    combined_confidence, AnalysisMode, AnalysisReport, AnalysisStatus, AnalysisType,
    ClassificationResult, PoseOutcome, PoseResult,
};

pub const CLOSE_UP_NOTE: &str = "skipped (close-up detected)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnalysisState {
    Init,
    PoseInferred,
    GatedPass,
    GatedFail,
    Classified,
    Skipped,
    DirectClassified,
    Done,
}

fn enter(state: AnalysisState) {
    log::debug!("analysis state -> {:?}", state);
}

enum PoseAttempt {
    Detected(PoseResult),
    /// Nothing usable; the image may be a close-up.
    Failed(String),
    /// The engine broke the landmark schema. Reported as is, no fallback.
    Rejected(String),
}

/// Drives one pose engine and one classification engine over successive images.
pub struct SequentialAnalyzer {
    pose_engine: Box<dyn PoseEngine>,
    classifier: Box<dyn ClassificationEngine>,
    gate: QualityGate,
    interpreter: PoseInterpreter,
    catalog: RecommendationCatalog,
}

impl SequentialAnalyzer {
    /// Build an analyzer around already-loaded engines.
    ///
    /// Fails if the pose engine's landmark schema differs from the rooster schema.
    pub fn new(
        pose_engine: Box<dyn PoseEngine>,
        classifier: Box<dyn ClassificationEngine>,
        config: &AnalyzerConfig,
    ) -> Result<Self, ModelLoadError> {
        let actual = pose_engine.landmark_count();
        if actual != LANDMARK_COUNT {
            return Err(ModelLoadError::LandmarkSchema {
                expected: LANDMARK_COUNT,
                actual,
            });
        }
        Ok(Self {
            pose_engine,
            classifier,
            gate: QualityGate::new(config.gate),
            interpreter: PoseInterpreter::new(config.anomalies),
            catalog: RecommendationCatalog::new(),
        })
    }

    pub fn from_engines(engines: Engines, config: &AnalyzerConfig) -> Result<Self, ModelLoadError> {
        Self::new(engines.pose, engines.classifier, config)
    }

    /// Load both models once; the analyzer is then reused for every image.
    pub fn load(
        pose_model: &Path,
        classifier_model: &Path,
        config: &AnalyzerConfig,
    ) -> Result<Self, ModelLoadError> {
        let engines = load_engines(pose_model, classifier_model, &config.models)?;
        Self::from_engines(engines, config)
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    pub fn interpreter(&self) -> &PoseInterpreter {
        &self.interpreter
    }

    /// Run the full sequential analysis for one image.
    pub fn analyze(&mut self, image: &AnalysisImage) -> AnalysisReport {
        enter(AnalysisState::Init);
        let attempt = self.infer_pose(image);
        enter(AnalysisState::PoseInferred);

        if let PoseAttempt::Failed(reason) = &attempt {
            log::info!("pose stage failed ({}); trying direct classification", reason);
            match self.classify(image) {
                Ok(classification) => {
                    enter(AnalysisState::DirectClassified);
                    let report = self.close_up_report(image, classification);
                    enter(AnalysisState::Done);
                    return report;
                }
                // The pose failure stays the reported cause.
                Err(err) => log::warn!("direct classification fallback failed: {}", err),
            }
        }

        let report = match attempt {
            PoseAttempt::Failed(error) => self.pose_failed_report(image, error),
            PoseAttempt::Rejected(error) => {
                log::warn!("pose output rejected: {}", error);
                self.pose_failed_report(image, error)
            }
            PoseAttempt::Detected(pose) if !pose.gate_passed() => {
                enter(AnalysisState::GatedFail);
                enter(AnalysisState::Skipped);
                self.insufficient_quality_report(image, pose)
            }
            PoseAttempt::Detected(pose) => {
                enter(AnalysisState::GatedPass);
                match self.classify(image) {
                    Ok(classification) => {
                        enter(AnalysisState::Classified);
                        self.complete_report(image, pose, classification)
                    }
                    Err(err) => self.classification_failed_report(image, pose, err),
                }
            }
        };
        enter(AnalysisState::Done);
        report
    }

    fn infer_pose(&mut self, image: &AnalysisImage) -> PoseAttempt {
        let raw = match self.pose_engine.infer(image) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PoseAttempt::Failed("No detection results".to_string()),
            Err(err) => return PoseAttempt::Failed(err.to_string()),
        };
        let keypoints = match KeypointSet::from_raw(&raw.keypoints) {
            Ok(keypoints) => keypoints,
            Err(err) if err.is_schema_violation() => return PoseAttempt::Rejected(err.to_string()),
            Err(err) => return PoseAttempt::Failed(err.to_string()),
        };
        if !keypoints.has_signal() {
            return PoseAttempt::Failed("No keypoints detected".to_string());
        }
        let pose = PoseResult::assess(
            keypoints,
            raw.overall_confidence,
            &self.gate,
            &self.interpreter,
        );
        log::info!(
            "pose: confidence={:.2} keypoints={} quality={:?} gate_passed={}",
            pose.overall_confidence(),
            pose.detected_count(),
            pose.quality_label(),
            pose.gate_passed()
        );
        PoseAttempt::Detected(pose)
    }

    fn classify(
        &mut self,
        image: &AnalysisImage,
    ) -> Result<ClassificationResult, InferenceFailure> {
        let raw = self.classifier.infer(image)?;
        let classification = ClassificationResult::from_raw(raw)?;
        log::info!(
            "classification: {} ({:.2})",
            classification.label(),
            classification.confidence()
        );
        Ok(classification)
    }

    fn close_up_report(
        &self,
        image: &AnalysisImage,
        classification: ClassificationResult,
    ) -> AnalysisReport {
        let mut assessment = self.catalog.assess(classification.label(), None);
        assessment.findings.push(format!(
            "{} detected in close-up analysis",
            classification.label().title()
        ));
        let mut report = base_report(
            image,
            AnalysisType::DirectClassification,
            AnalysisMode::CloseUp,
            AnalysisStatus::Complete,
            PoseOutcome::Skipped {
                note: CLOSE_UP_NOTE.to_string(),
            },
        );
        report.classification = Some(classification);
        attach(&mut report, assessment);
        report
    }

    fn pose_failed_report(&self, image: &AnalysisImage, error: String) -> AnalysisReport {
        let mut report = base_report(
            image,
            AnalysisType::SequentialValidation,
            AnalysisMode::FullBody,
            AnalysisStatus::PoseFailed,
            PoseOutcome::Failed {
                error: error.clone(),
            },
        );
        report.error = Some(error);
        self.attach_remediation(&mut report);
        report
    }

    fn insufficient_quality_report(
        &self,
        image: &AnalysisImage,
        pose: PoseResult,
    ) -> AnalysisReport {
        let thresholds = self.gate.thresholds();
        let error = format!(
            "pose quality gate not met: confidence {:.2} (min {:.2}), keypoints {} (min {})",
            pose.overall_confidence(),
            thresholds.pose_confidence,
            pose.detected_count(),
            thresholds.min_keypoints
        );
        let mut report = base_report(
            image,
            AnalysisType::SequentialValidation,
            AnalysisMode::FullBody,
            AnalysisStatus::InsufficientQuality,
            PoseOutcome::Detected(pose),
        );
        report.quality_threshold = Some(thresholds.pose_confidence);
        report.error = Some(error);
        self.attach_remediation(&mut report);
        report
    }

    fn classification_failed_report(
        &self,
        image: &AnalysisImage,
        pose: PoseResult,
        err: InferenceFailure,
    ) -> AnalysisReport {
        log::warn!("classification failed after gate pass: {}", err);
        let mut report = base_report(
            image,
            AnalysisType::SequentialValidation,
            AnalysisMode::FullBody,
            AnalysisStatus::ClassificationFailed,
            PoseOutcome::Detected(pose),
        );
        report.error = Some(err.to_string());
        self.attach_remediation(&mut report);
        report
    }

    fn complete_report(
        &self,
        image: &AnalysisImage,
        pose: PoseResult,
        classification: ClassificationResult,
    ) -> AnalysisReport {
        let anomalies = self.interpreter.find_geometric_anomalies(pose.keypoints());
        let assessment = self.catalog.assess(classification.label(), Some(&anomalies));
        let combined = combined_confidence(pose.overall_confidence(), classification.confidence());
        let mut report = base_report(
            image,
            AnalysisType::SequentialValidation,
            AnalysisMode::FullBody,
            AnalysisStatus::Complete,
            PoseOutcome::Detected(pose),
        );
        report.classification = Some(classification);
        report.combined_confidence = Some(combined);
        attach(&mut report, assessment);
        report
    }

    fn attach_remediation(&self, report: &mut AnalysisReport) {
        if let Some(remediation) = self.catalog.remediation(report.status) {
            report.primary_issue = Some(remediation.primary_issue.to_string());
            report.recommendations = remediation
                .recommendations
                .iter()
                .map(|line| line.to_string())
                .collect();
        }
    }
}

fn base_report(
    image: &AnalysisImage,
    analysis_type: AnalysisType,
    mode: AnalysisMode,
    status: AnalysisStatus,
    pose: PoseOutcome,
) -> AnalysisReport {
    AnalysisReport {
        analysis_type,
        mode,
        status,
        timestamp: image.timestamp(),
        pose,
        classification: None,
        combined_confidence: None,
        quality_threshold: None,
        primary_issue: None,
        error: None,
        findings: Vec::new(),
        recommendations: Vec::new(),
    }
}

fn attach(report: &mut AnalysisReport, assessment: Assessment) {
    for finding in assessment.findings {
        if !report.findings.contains(&finding) {
            report.findings.push(finding);
        }
    }
    report.recommendations = assessment.recommendations;
}
