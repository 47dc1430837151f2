//! Rooster pose landmarks and keypoint sets.
//!
//! Pose engines report keypoints by positional index. `Landmark::ALL` fixes the
//! index → name association; any index past the end of the schema is rejected
//! instead of being silently dropped.

use serde::Serialize;

use crate::engine::RawKeypoint;
use crate::error::InferenceFailure;

/// Number of landmarks in the rooster pose schema.
pub const LANDMARK_COUNT: usize = 17;

/// Anatomical landmarks, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    BeakTip,
    Eye,
    CombTop,
    NeckBase,
    Chest,
    BackMid,
    TailBase,
    LeftWingShoulder,
    LeftWingElbow,
    LeftWingTip,
    RightWingShoulder,
    RightWingElbow,
    RightWingTip,
    LeftLegJoint,
    LeftFoot,
    RightLegJoint,
    RightFoot,
}

impl Landmark {
    pub const ALL: [Landmark; LANDMARK_COUNT] = [
        Landmark::BeakTip,
        Landmark::Eye,
        Landmark::CombTop,
        Landmark::NeckBase,
        Landmark::Chest,
        Landmark::BackMid,
        Landmark::TailBase,
        Landmark::LeftWingShoulder,
        Landmark::LeftWingElbow,
        Landmark::LeftWingTip,
        Landmark::RightWingShoulder,
        Landmark::RightWingElbow,
        Landmark::RightWingTip,
        Landmark::LeftLegJoint,
        Landmark::LeftFoot,
        Landmark::RightLegJoint,
        Landmark::RightFoot,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Landmark::BeakTip => "beak_tip",
            Landmark::Eye => "eye",
            Landmark::CombTop => "comb_top",
            Landmark::NeckBase => "neck_base",
            Landmark::Chest => "chest",
            Landmark::BackMid => "back_mid",
            Landmark::TailBase => "tail_base",
            Landmark::LeftWingShoulder => "left_wing_shoulder",
            Landmark::LeftWingElbow => "left_wing_elbow",
            Landmark::LeftWingTip => "left_wing_tip",
            Landmark::RightWingShoulder => "right_wing_shoulder",
            Landmark::RightWingElbow => "right_wing_elbow",
            Landmark::RightWingTip => "right_wing_tip",
            Landmark::LeftLegJoint => "left_leg_joint",
            Landmark::LeftFoot => "left_foot",
            Landmark::RightLegJoint => "right_leg_joint",
            Landmark::RightFoot => "right_foot",
        }
    }
}

/// A named landmark with a position in source image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Keypoint {
    #[serde(rename = "name")]
    pub landmark: Landmark,
    pub x: f32,
    pub y: f32,
    /// Detection confidence (0.0-1.0).
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(landmark: Landmark, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            landmark,
            x,
            y,
            confidence,
        }
    }

    /// Strictly above `threshold`; a keypoint exactly at the threshold is not visible.
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

/// Ordered keypoints from a single pose inference.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeypointSet {
    points: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    /// Map raw engine output onto the landmark schema.
    ///
    /// Each landmark may appear at most once, so the set never exceeds
    /// `LANDMARK_COUNT` keypoints.
    pub fn from_raw(raw: &[RawKeypoint]) -> Result<Self, InferenceFailure> {
        if raw.len() > LANDMARK_COUNT {
            return Err(InferenceFailure::TooManyKeypoints {
                count: raw.len(),
                max: LANDMARK_COUNT,
            });
        }
        let mut seen = [false; LANDMARK_COUNT];
        let mut points = Vec::with_capacity(raw.len());
        for kp in raw {
            let landmark = Landmark::from_index(kp.index).ok_or(InferenceFailure::LandmarkIndex {
                index: kp.index,
                count: LANDMARK_COUNT,
            })?;
            if std::mem::replace(&mut seen[landmark.index()], true) {
                return Err(InferenceFailure::DuplicateLandmark {
                    landmark: landmark.as_str(),
                });
            }
            points.push(Keypoint::new(landmark, kp.x, kp.y, kp.confidence));
        }
        Ok(Self { points })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First keypoint reported for `landmark`.
    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.points.iter().find(|kp| kp.landmark == landmark)
    }

    /// Visible keypoint for `landmark`, if any.
    pub fn visible(&self, landmark: Landmark, threshold: f32) -> Option<&Keypoint> {
        self.points
            .iter()
            .find(|kp| kp.landmark == landmark && kp.is_visible(threshold))
    }

    pub fn detected_count(&self, threshold: f32) -> usize {
        self.points
            .iter()
            .filter(|kp| kp.is_visible(threshold))
            .count()
    }

    /// True when at least one keypoint carries nonzero confidence.
    pub fn has_signal(&self) -> bool {
        self.points.iter().any(|kp| kp.confidence > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(index: usize, confidence: f32) -> RawKeypoint {
        RawKeypoint {
            index,
            x: index as f32,
            y: 2.0 * index as f32,
            confidence,
        }
    }

    #[test]
    fn landmark_order_matches_schema() {
        assert_eq!(Landmark::ALL.len(), LANDMARK_COUNT);
        for (idx, landmark) in Landmark::ALL.iter().enumerate() {
            assert_eq!(landmark.index(), idx);
            assert_eq!(Landmark::from_index(idx), Some(*landmark));
        }
        assert_eq!(Landmark::from_index(4), Some(Landmark::Chest));
        assert_eq!(Landmark::from_index(9), Some(Landmark::LeftWingTip));
        assert_eq!(Landmark::from_index(16), Some(Landmark::RightFoot));
        assert_eq!(Landmark::from_index(17), None);
    }

    #[test]
    fn from_raw_maps_positions_to_landmarks() {
        let set = KeypointSet::from_raw(&[raw(0, 0.9), raw(12, 0.4)]).unwrap();
        assert_eq!(set.len(), 2);
        let tip = set.get(Landmark::RightWingTip).unwrap();
        assert_eq!(tip.x, 12.0);
        assert_eq!(tip.y, 24.0);
        assert!(set.get(Landmark::Chest).is_none());
    }

    #[test]
    fn from_raw_rejects_indices_past_schema() {
        let err = KeypointSet::from_raw(&[raw(3, 0.9), raw(17, 0.9)]).unwrap_err();
        assert_eq!(
            err,
            InferenceFailure::LandmarkIndex {
                index: 17,
                count: LANDMARK_COUNT
            }
        );
    }

    #[test]
    fn from_raw_rejects_repeated_landmarks() {
        let repeated: Vec<RawKeypoint> = (0..LANDMARK_COUNT).map(|_| raw(0, 0.9)).collect();
        let err = KeypointSet::from_raw(&repeated).unwrap_err();
        assert_eq!(
            err,
            InferenceFailure::DuplicateLandmark {
                landmark: "beak_tip"
            }
        );
        assert!(err.is_schema_violation());
    }

    #[test]
    fn from_raw_rejects_more_than_schema_size() {
        let mut points: Vec<RawKeypoint> = (0..LANDMARK_COUNT).map(|i| raw(i, 0.9)).collect();
        assert_eq!(KeypointSet::from_raw(&points).unwrap().len(), LANDMARK_COUNT);
        points.push(raw(3, 0.9));
        assert_eq!(
            KeypointSet::from_raw(&points).unwrap_err(),
            InferenceFailure::TooManyKeypoints {
                count: 18,
                max: LANDMARK_COUNT
            }
        );
    }

    #[test]
    fn detected_count_is_strictly_above_threshold() {
        let set = KeypointSet::from_raw(&[raw(0, 0.5), raw(1, 0.51), raw(2, 0.99)]).unwrap();
        assert_eq!(set.detected_count(0.5), 2);
        assert!(set.visible(Landmark::BeakTip, 0.5).is_none());
        assert!(set.visible(Landmark::Eye, 0.5).is_some());
    }

    #[test]
    fn has_signal_requires_nonzero_confidence() {
        assert!(!KeypointSet::default().has_signal());
        let zeros = KeypointSet::from_raw(&[raw(0, 0.0), raw(1, 0.0)]).unwrap();
        assert!(!zeros.has_signal());
        let weak = KeypointSet::from_raw(&[raw(0, 0.0), raw(1, 0.05)]).unwrap();
        assert!(weak.has_signal());
    }
}
