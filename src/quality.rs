//! Pose quality gating and interpretation.

use serde::Serialize;

use crate::keypoint::{KeypointSet, Landmark};

pub const DEFAULT_POSE_CONFIDENCE_THRESHOLD: f64 = 0.65;
pub const DEFAULT_MIN_KEYPOINTS_DETECTED: usize = 12;
pub const DEFAULT_KEYPOINT_VISIBILITY: f32 = 0.5;
pub const DEFAULT_WING_ASYMMETRY_PX: f32 = 30.0;
pub const DEFAULT_LEG_OFFSET_PX: f32 = 25.0;

pub const WING_ASYMMETRY_FINDING: &str = "wing asymmetry detected";
pub const UNEVEN_LEGS_FINDING: &str = "uneven leg positioning";

/// Acceptance thresholds for the pose quality gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateThresholds {
    pub pose_confidence: f64,
    pub min_keypoints: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            pose_confidence: DEFAULT_POSE_CONFIDENCE_THRESHOLD,
            min_keypoints: DEFAULT_MIN_KEYPOINTS_DETECTED,
        }
    }
}

/// Decides whether a pose result is trustworthy enough to drive classification.
///
/// Both thresholds must hold. There is no partial credit.
#[derive(Clone, Copy, Debug, Default)]
pub struct QualityGate {
    thresholds: GateThresholds,
}

impl QualityGate {
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> GateThresholds {
        self.thresholds
    }

    pub fn evaluate(&self, overall_confidence: f64, detected_count: usize) -> bool {
        overall_confidence >= self.thresholds.pose_confidence
            && detected_count >= self.thresholds.min_keypoints
    }
}

/// Qualitative pose quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Acceptable,
    Poor,
}

// Highest first; first match wins.
const QUALITY_CASCADE: [(f64, usize, QualityLabel); 4] = [
    (0.85, 16, QualityLabel::Excellent),
    (0.65, 12, QualityLabel::Good),
    (0.50, 10, QualityLabel::Fair),
    (0.35, 8, QualityLabel::Acceptable),
];

/// Pixel limits for the geometric checks in [`PoseInterpreter::find_geometric_anomalies`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnomalyThresholds {
    /// Keypoints at or below this confidence are ignored.
    pub keypoint_visibility: f32,
    pub wing_asymmetry_px: f32,
    pub leg_offset_px: f32,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            keypoint_visibility: DEFAULT_KEYPOINT_VISIBILITY,
            wing_asymmetry_px: DEFAULT_WING_ASYMMETRY_PX,
            leg_offset_px: DEFAULT_LEG_OFFSET_PX,
        }
    }
}

/// Derives quality labels and injury-relevant geometry from keypoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseInterpreter {
    thresholds: AnomalyThresholds,
}

impl PoseInterpreter {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn keypoint_visibility(&self) -> f32 {
        self.thresholds.keypoint_visibility
    }

    pub fn classify_quality(&self, overall_confidence: f64, detected_count: usize) -> QualityLabel {
        QUALITY_CASCADE
            .iter()
            .find(|(confidence, count, _)| {
                overall_confidence >= *confidence && detected_count >= *count
            })
            .map(|(_, _, label)| *label)
            .unwrap_or(QualityLabel::Poor)
    }

    /// Geometric findings, in check order. Checks whose landmarks are missing are skipped.
    pub fn find_geometric_anomalies(&self, keypoints: &KeypointSet) -> Vec<String> {
        let visibility = self.thresholds.keypoint_visibility;
        let visible = move |landmark: Landmark| keypoints.visible(landmark, visibility);
        let mut findings = Vec::new();

        if let (Some(left), Some(right), Some(chest)) = (
            visible(Landmark::LeftWingTip),
            visible(Landmark::RightWingTip),
            visible(Landmark::Chest),
        ) {
            let left_drop = left.y - chest.y;
            let right_drop = right.y - chest.y;
            if (left_drop - right_drop).abs() > self.thresholds.wing_asymmetry_px {
                findings.push(WING_ASYMMETRY_FINDING.to_string());
            }
        }

        if let (Some(left), Some(right)) =
            (visible(Landmark::LeftFoot), visible(Landmark::RightFoot))
        {
            if (left.y - right.y).abs() > self.thresholds.leg_offset_px {
                findings.push(UNEVEN_LEGS_FINDING.to_string());
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Keypoint;

    fn kp(landmark: Landmark, y: f32) -> Keypoint {
        Keypoint::new(landmark, 100.0, y, 0.9)
    }

    #[test]
    fn gate_requires_both_thresholds() {
        let gate = QualityGate::default();
        assert!(gate.evaluate(0.65, 12));
        assert!(gate.evaluate(0.99, 17));
        assert!(!gate.evaluate(0.64, 17));
        assert!(!gate.evaluate(0.99, 11));
        assert!(!gate.evaluate(f64::NAN, 17));
    }

    #[test]
    fn gate_is_monotonic() {
        let gate = QualityGate::default();
        let confidences: Vec<f64> = (0..=20).map(|i| i as f64 * 0.05).collect();
        for (ci, &conf) in confidences.iter().enumerate() {
            for count in 0..=17usize {
                if !gate.evaluate(conf, count) {
                    continue;
                }
                for &higher in &confidences[ci..] {
                    assert!(gate.evaluate(higher, count));
                }
                for more in count..=17 {
                    assert!(gate.evaluate(conf, more));
                }
            }
        }
    }

    #[test]
    fn gate_uses_configured_thresholds() {
        let gate = QualityGate::new(GateThresholds {
            pose_confidence: 0.5,
            min_keypoints: 8,
        });
        assert!(gate.evaluate(0.5, 8));
        assert!(!gate.evaluate(0.49, 8));
        assert!(!gate.evaluate(0.5, 7));
    }

    #[test]
    fn quality_cascade() {
        let interp = PoseInterpreter::default();
        assert_eq!(interp.classify_quality(0.90, 17), QualityLabel::Excellent);
        assert_eq!(interp.classify_quality(0.60, 11), QualityLabel::Fair);
        assert_eq!(interp.classify_quality(0.10, 2), QualityLabel::Poor);
        assert_eq!(interp.classify_quality(0.65, 12), QualityLabel::Good);
        assert_eq!(interp.classify_quality(0.35, 8), QualityLabel::Acceptable);
        // high confidence alone does not lift the label
        assert_eq!(interp.classify_quality(0.95, 9), QualityLabel::Acceptable);
        assert_eq!(interp.classify_quality(0.95, 7), QualityLabel::Poor);
    }

    #[test]
    fn wing_asymmetry_detected() {
        let set = KeypointSet::new(vec![
            kp(Landmark::Chest, 40.0),
            kp(Landmark::LeftWingTip, 100.0),
            kp(Landmark::RightWingTip, 50.0),
        ]);
        let findings = PoseInterpreter::default().find_geometric_anomalies(&set);
        assert_eq!(findings, vec![WING_ASYMMETRY_FINDING.to_string()]);
    }

    #[test]
    fn small_wing_difference_is_ignored() {
        let set = KeypointSet::new(vec![
            kp(Landmark::Chest, 40.0),
            kp(Landmark::LeftWingTip, 100.0),
            kp(Landmark::RightWingTip, 95.0),
        ]);
        assert!(PoseInterpreter::default()
            .find_geometric_anomalies(&set)
            .is_empty());
    }

    #[test]
    fn low_confidence_landmarks_skip_checks() {
        let mut chest = kp(Landmark::Chest, 40.0);
        chest.confidence = 0.5;
        let set = KeypointSet::new(vec![
            chest,
            kp(Landmark::LeftWingTip, 100.0),
            kp(Landmark::RightWingTip, 50.0),
            kp(Landmark::LeftFoot, 300.0),
        ]);
        assert!(PoseInterpreter::default()
            .find_geometric_anomalies(&set)
            .is_empty());
    }

    #[test]
    fn findings_follow_check_order() {
        let set = KeypointSet::new(vec![
            kp(Landmark::RightFoot, 300.0),
            kp(Landmark::LeftFoot, 260.0),
            kp(Landmark::Chest, 40.0),
            kp(Landmark::LeftWingTip, 100.0),
            kp(Landmark::RightWingTip, 50.0),
        ]);
        let findings = PoseInterpreter::default().find_geometric_anomalies(&set);
        assert_eq!(findings, vec![WING_ASYMMETRY_FINDING, UNEVEN_LEGS_FINDING]);
    }

    #[test]
    fn leg_offset_boundary_is_exclusive() {
        let set = KeypointSet::new(vec![
            kp(Landmark::LeftFoot, 300.0),
            kp(Landmark::RightFoot, 275.0),
        ]);
        assert!(PoseInterpreter::default()
            .find_geometric_anomalies(&set)
            .is_empty());
    }
}
