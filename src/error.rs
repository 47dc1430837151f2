//! Error taxonomy.
//!
//! - `ModelLoadError`: fatal. Analysis cannot start without both engines.
//! - `InferenceFailure`: recoverable. The analyzer converts it into a report status.
//! - `InputError`: the image could not be read before analysis.
//!
//! A pose run that detects nothing is not an engine error. Engines return `Ok(None)`
//! and the analyzer decides how to report it.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to prepare an inference engine.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("{engine} model not found: {}", path.display())]
    NotFound { engine: &'static str, path: PathBuf },

    #[error("failed to load {engine} model from {}: {reason}", path.display())]
    Backend {
        engine: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("pose engine reports {actual} landmarks, expected {expected}")]
    LandmarkSchema { expected: usize, actual: usize },

    #[error("unknown stub model '{0}'")]
    UnknownStub(String),

    #[error("{engine} model {} requires the backend-tract feature", path.display())]
    BackendUnavailable { engine: &'static str, path: PathBuf },
}

/// Failure during a single inference call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceFailure {
    #[error("{engine} inference failed: {reason}")]
    Engine { engine: &'static str, reason: String },

    #[error("landmark index {index} outside the {count}-landmark schema")]
    LandmarkIndex { index: usize, count: usize },

    #[error("landmark {landmark} reported more than once")]
    DuplicateLandmark { landmark: &'static str },

    #[error("{count} keypoints exceed the {max}-landmark schema")]
    TooManyKeypoints { count: usize, max: usize },

    #[error("malformed {engine} output: {reason}")]
    MalformedOutput { engine: &'static str, reason: String },

    #[error("no classification probabilities available")]
    NoProbabilities,
}

impl InferenceFailure {
    pub fn engine(engine: &'static str, reason: impl Into<String>) -> Self {
        Self::Engine {
            engine,
            reason: reason.into(),
        }
    }

    pub fn malformed(engine: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            engine,
            reason: reason.into(),
        }
    }

    /// Pose output that breaks the landmark schema. Never retried as a close-up.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Self::LandmarkIndex { .. }
                | Self::DuplicateLandmark { .. }
                | Self::TooManyKeypoints { .. }
        )
    }
}

/// Failure to read an input image.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
}

/// Any failure that prevents an analysis from starting.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load models: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Input(#[from] InputError),
}

impl ScanError {
    /// Stage name reported in `{success: false, error, stage}` envelopes.
    pub fn stage(&self) -> &'static str {
        match self {
            ScanError::Config(_) => "configuration",
            ScanError::ModelLoad(_) => "model_loading",
            ScanError::Input(_) => "image_loading",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_stage_names() {
        let err = ScanError::from(ModelLoadError::NotFound {
            engine: "pose",
            path: PathBuf::from("pose.onnx"),
        });
        assert_eq!(err.stage(), "model_loading");
        assert!(err.to_string().contains("pose model not found: pose.onnx"));

        let err = ScanError::from(InputError::NotFound(PathBuf::from("bird.jpg")));
        assert_eq!(err.stage(), "image_loading");
        assert_eq!(err.to_string(), "image file not found: bird.jpg");

        assert_eq!(ScanError::Config("bad".into()).stage(), "configuration");
    }
}
