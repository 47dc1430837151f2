//! RoosterScan
//!
//! Sequential, pose-gated health analysis for rooster images.
//!
//! # Architecture
//!
//! 1. **Pose stage**: a pose engine reports 17 anatomical keypoints.
//! 2. **Quality gate**: classification only runs when pose confidence and the number
//!    of visible keypoints both clear configured thresholds.
//! 3. **Classification stage**: an image classifier labels the bird's condition.
//! 4. **Assessment**: a fixed catalog maps the label (plus pose geometry for wing
//!    injuries) to findings and recommendations.
//!
//! When pose estimation yields nothing usable (typically close-up framing), the
//! analyzer classifies the raw image directly and reports `close_up` mode.
//!
//! # Module Structure
//!
//! - `keypoint`: landmark schema and keypoint sets
//! - `quality`: quality gate and pose interpretation
//! - `catalog`: label-keyed recommendation table
//! - `report`: pose/classification results and the per-image report
//! - `orchestrator`: `SequentialAnalyzer`
//! - `engine`: inference engine traits, stub and tract backends, loading
//! - `input`, `config`, `error`: image input, configuration, error taxonomy

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod keypoint;
pub mod orchestrator;
pub mod quality;
pub mod report;

pub use catalog::{Assessment, CatalogEntry, HealthLabel, RecommendationCatalog, Remediation};
pub use config::{AnalyzerConfig, ModelSettings};
pub use engine::{
    load_engines, CallCounter, ClassificationEngine, Engines, PoseEngine, RawClassification,
    RawKeypoint, RawPose, StubClassificationEngine, StubPoseEngine,
};
pub use error::{InferenceFailure, InputError, ModelLoadError, ScanError};
pub use input::AnalysisImage;
pub use keypoint::{Keypoint, KeypointSet, Landmark, LANDMARK_COUNT};
pub use orchestrator::SequentialAnalyzer;
pub use quality::{AnomalyThresholds, GateThresholds, PoseInterpreter, QualityGate, QualityLabel};
pub use report::{
    combined_confidence, AnalysisMode, AnalysisReport, AnalysisStatus, AnalysisType,
    ClassificationResult, FailureEnvelope, PoseOutcome, PoseResult, ReportEnvelope, ScanOutput,
};
