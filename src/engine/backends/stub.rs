use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::backend::{
    ClassificationEngine, PoseEngine, RawClassification, RawKeypoint, RawPose,
};
use crate::error::{InferenceFailure, ModelLoadError};
use crate::input::AnalysisImage;
use crate::keypoint::LANDMARK_COUNT;

/// Shared count of `infer` calls made on a stub engine.
///
/// Clones observe the same counter, so a test can keep one after handing the engine
/// to an analyzer.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// Side view of a standing bird, in pixels of a 640x640 frame.
const STANDING_LAYOUT: [(f32, f32); LANDMARK_COUNT] = [
    (420.0, 150.0), // beak_tip
    (400.0, 135.0), // eye
    (395.0, 105.0), // comb_top
    (370.0, 200.0), // neck_base
    (360.0, 270.0), // chest
    (300.0, 240.0), // back_mid
    (200.0, 210.0), // tail_base
    (330.0, 245.0), // left_wing_shoulder
    (290.0, 275.0), // left_wing_elbow
    (240.0, 300.0), // left_wing_tip
    (335.0, 250.0), // right_wing_shoulder
    (295.0, 280.0), // right_wing_elbow
    (245.0, 305.0), // right_wing_tip
    (320.0, 360.0), // left_leg_joint
    (315.0, 440.0), // left_foot
    (340.0, 362.0), // right_leg_joint
    (338.0, 442.0), // right_foot
];

/// Stub pose engine with a fixed response.
pub struct StubPoseEngine {
    response: Result<Option<RawPose>, InferenceFailure>,
    landmark_count: usize,
    calls: CallCounter,
}

impl StubPoseEngine {
    pub fn returning(pose: RawPose) -> Self {
        Self::with_response(Ok(Some(pose)))
    }

    /// Every landmark visible at `confidence` in a standing layout with no anomalies.
    pub fn full_body(confidence: f32) -> Self {
        let keypoints = STANDING_LAYOUT
            .iter()
            .enumerate()
            .map(|(index, &(x, y))| RawKeypoint {
                index,
                x,
                y,
                confidence,
            })
            .collect();
        Self::returning(RawPose {
            keypoints,
            overall_confidence: f64::from(confidence),
        })
    }

    /// The model ran but found no subject.
    pub fn no_detection() -> Self {
        Self::with_response(Ok(None))
    }

    pub fn failing(reason: &str) -> Self {
        Self::with_response(Err(InferenceFailure::engine("stub-pose", reason)))
    }

    /// Report a different landmark schema than the rooster model.
    pub fn with_landmark_count(mut self, count: usize) -> Self {
        self.landmark_count = count;
        self
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    fn with_response(response: Result<Option<RawPose>, InferenceFailure>) -> Self {
        Self {
            response,
            landmark_count: LANDMARK_COUNT,
            calls: CallCounter::default(),
        }
    }
}

impl PoseEngine for StubPoseEngine {
    fn name(&self) -> &'static str {
        "stub-pose"
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    fn infer(&mut self, _image: &AnalysisImage) -> Result<Option<RawPose>, InferenceFailure> {
        self.calls.bump();
        self.response.clone()
    }
}

/// Stub classifier with a fixed response.
pub struct StubClassificationEngine {
    response: Result<RawClassification, InferenceFailure>,
    calls: CallCounter,
}

impl StubClassificationEngine {
    /// Predict `label` with `confidence`; the remainder is spread over `others`.
    pub fn returning(label: &str, confidence: f64, others: &[&str]) -> Self {
        let rest = if others.is_empty() {
            0.0
        } else {
            (1.0 - confidence) / others.len() as f64
        };
        let mut class_probabilities = vec![(label.to_string(), confidence)];
        class_probabilities.extend(others.iter().map(|other| (other.to_string(), rest)));
        Self::with_response(Ok(RawClassification {
            label: label.to_string(),
            confidence,
            class_probabilities,
        }))
    }

    pub fn failing(reason: &str) -> Self {
        Self::with_response(Err(InferenceFailure::engine("stub-classifier", reason)))
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    fn with_response(response: Result<RawClassification, InferenceFailure>) -> Self {
        Self {
            response,
            calls: CallCounter::default(),
        }
    }
}

impl ClassificationEngine for StubClassificationEngine {
    fn name(&self) -> &'static str {
        "stub-classifier"
    }

    fn infer(&mut self, _image: &AnalysisImage) -> Result<RawClassification, InferenceFailure> {
        self.calls.bump();
        self.response.clone()
    }
}

/// Build a pose stub from a `stub://pose/<mode>` model path.
pub fn pose_from_spec(spec: &str) -> Result<StubPoseEngine, ModelLoadError> {
    match spec.strip_prefix("pose/") {
        Some("full_body") => Ok(StubPoseEngine::full_body(0.9)),
        Some("none") => Ok(StubPoseEngine::no_detection()),
        Some("error") => Ok(StubPoseEngine::failing("stub pose failure")),
        _ => Err(ModelLoadError::UnknownStub(spec.to_string())),
    }
}

/// Build a classifier stub from a `stub://classifier/<label>` model path.
pub fn classifier_from_spec(
    spec: &str,
    labels: &[String],
) -> Result<StubClassificationEngine, ModelLoadError> {
    match spec.strip_prefix("classifier/") {
        Some("error") => Ok(StubClassificationEngine::failing("stub classifier failure")),
        Some(label) if !label.is_empty() => {
            let others: Vec<&str> = labels
                .iter()
                .map(String::as_str)
                .filter(|other| *other != label)
                .collect();
            Ok(StubClassificationEngine::returning(label, 0.9, &others))
        }
        _ => Err(ModelLoadError::UnknownStub(spec.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::KeypointSet;
    use crate::quality::PoseInterpreter;
    use image::RgbImage;

    fn image() -> AnalysisImage {
        AnalysisImage::from_rgb(RgbImage::new(8, 8))
    }

    #[test]
    fn stub_pose_counts_calls() {
        let mut engine = StubPoseEngine::full_body(0.9);
        let calls = engine.calls();
        assert_eq!(calls.get(), 0);
        let pose = engine.infer(&image()).unwrap().unwrap();
        assert_eq!(pose.keypoints.len(), LANDMARK_COUNT);
        engine.infer(&image()).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn standing_layout_has_no_anomalies() {
        let mut engine = StubPoseEngine::full_body(0.9);
        let pose = engine.infer(&image()).unwrap().unwrap();
        let set = KeypointSet::from_raw(&pose.keypoints).unwrap();
        assert!(PoseInterpreter::default()
            .find_geometric_anomalies(&set)
            .is_empty());
    }

    #[test]
    fn stub_classifier_spreads_remaining_probability() {
        let mut engine =
            StubClassificationEngine::returning("bumblefoot", 0.8, &["healthy", "wing_injury"]);
        let raw = engine.infer(&image()).unwrap();
        assert_eq!(raw.label, "bumblefoot");
        let total: f64 = raw.class_probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(engine.calls().get(), 1);
    }

    #[test]
    fn stub_specs() {
        let labels = vec!["healthy".to_string(), "bumblefoot".to_string()];
        assert!(pose_from_spec("pose/full_body").is_ok());
        assert!(pose_from_spec("pose/none").is_ok());
        assert!(matches!(
            pose_from_spec("pose/sideways"),
            Err(ModelLoadError::UnknownStub(_))
        ));

        let mut classifier = classifier_from_spec("classifier/bumblefoot", &labels).unwrap();
        let raw = classifier.infer(&image()).unwrap();
        assert_eq!(raw.class_probabilities.len(), 2);
        assert!(classifier_from_spec("classifier/", &labels).is_err());
        let mut failing = classifier_from_spec("classifier/error", &labels).unwrap();
        assert!(failing.infer(&image()).is_err());
    }
}
