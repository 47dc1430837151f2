use crate::error::InferenceFailure;
use crate::input::AnalysisImage;

/// Keypoint as reported by a pose engine, addressed by landmark index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawKeypoint {
    pub index: usize,
    /// Source image pixels.
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// Pose engine output for the most confident subject in the image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPose {
    pub keypoints: Vec<RawKeypoint>,
    pub overall_confidence: f64,
}

/// Classifier output: top-1 label plus the full distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct RawClassification {
    pub label: String,
    pub confidence: f64,
    pub class_probabilities: Vec<(String, f64)>,
}

impl RawClassification {
    /// Pick the top-1 class from a probability vector aligned with `labels`.
    pub fn from_probabilities(
        labels: &[String],
        probabilities: &[f64],
    ) -> Result<Self, InferenceFailure> {
        if probabilities.is_empty() {
            return Err(InferenceFailure::NoProbabilities);
        }
        if labels.len() != probabilities.len() {
            return Err(InferenceFailure::malformed(
                "classification",
                format!(
                    "{} probabilities for {} configured labels",
                    probabilities.len(),
                    labels.len()
                ),
            ));
        }
        let (top, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (idx, p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((idx, p)),
            })
            .ok_or_else(|| {
                InferenceFailure::malformed("classification", "no finite probabilities")
            })?;

        Ok(Self {
            label: labels[top].clone(),
            confidence,
            class_probabilities: labels
                .iter()
                .cloned()
                .zip(probabilities.iter().copied())
                .collect(),
        })
    }
}

/// Pose/keypoint inference engine.
///
/// Engines are loaded once and reused for every image. Implementations must not let
/// one `infer` call influence the result of another.
pub trait PoseEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Number of landmarks the underlying model emits per subject.
    fn landmark_count(&self) -> usize;

    /// Run pose inference. `Ok(None)` means the model produced no detection.
    fn infer(&mut self, image: &AnalysisImage) -> Result<Option<RawPose>, InferenceFailure>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), InferenceFailure> {
        Ok(())
    }
}

/// Image classification engine. The same engine serves gated and direct calls.
pub trait ClassificationEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    fn infer(&mut self, image: &AnalysisImage) -> Result<RawClassification, InferenceFailure>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), InferenceFailure> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["bumblefoot", "healthy", "wing_injury"]
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn from_probabilities_picks_top_class() {
        let raw = RawClassification::from_probabilities(&labels(), &[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(raw.label, "healthy");
        assert_eq!(raw.confidence, 0.7);
        assert_eq!(raw.class_probabilities.len(), 3);
        assert_eq!(raw.class_probabilities[2], ("wing_injury".to_string(), 0.2));
    }

    #[test]
    fn from_probabilities_prefers_first_on_ties() {
        let raw = RawClassification::from_probabilities(&labels(), &[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(raw.label, "bumblefoot");
    }

    #[test]
    fn from_probabilities_rejects_mismatched_lengths() {
        assert!(matches!(
            RawClassification::from_probabilities(&labels(), &[0.5, 0.5]),
            Err(InferenceFailure::MalformedOutput { .. })
        ));
        assert_eq!(
            RawClassification::from_probabilities(&[], &[]),
            Err(InferenceFailure::NoProbabilities)
        );
    }
}
