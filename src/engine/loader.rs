//! One-time engine loading.
//!
//! Model paths are either local files or `stub://` specs:
//! - `stub://pose/full_body`, `stub://pose/none`, `stub://pose/error`
//! - `stub://classifier/<label>`, `stub://classifier/error`
//!
//! Local files require the `backend-tract` feature.

use std::path::Path;

use super::backend::{ClassificationEngine, PoseEngine};
use super::backends::stub;
use crate::config::ModelSettings;
use crate::error::ModelLoadError;

pub const STUB_SCHEME: &str = "stub://";

/// The pair of engines an analyzer drives.
pub struct Engines {
    pub pose: Box<dyn PoseEngine>,
    pub classifier: Box<dyn ClassificationEngine>,
}

/// Load both engines. Any failure is fatal for the whole run.
pub fn load_engines(
    pose_model: &Path,
    classifier_model: &Path,
    settings: &ModelSettings,
) -> Result<Engines, ModelLoadError> {
    let mut pose = load_pose(pose_model, settings)?;
    let mut classifier = load_classifier(classifier_model, settings)?;
    pose.warm_up().map_err(|e| ModelLoadError::Backend {
        engine: "pose",
        path: pose_model.to_path_buf(),
        reason: e.to_string(),
    })?;
    classifier.warm_up().map_err(|e| ModelLoadError::Backend {
        engine: "classifier",
        path: classifier_model.to_path_buf(),
        reason: e.to_string(),
    })?;
    log::info!(
        "engines ready: pose={} classifier={}",
        pose.name(),
        classifier.name()
    );
    Ok(Engines { pose, classifier })
}

fn stub_spec(path: &Path) -> Option<&str> {
    path.to_str()?.strip_prefix(STUB_SCHEME)
}

fn load_pose(path: &Path, settings: &ModelSettings) -> Result<Box<dyn PoseEngine>, ModelLoadError> {
    if let Some(spec) = stub_spec(path) {
        return Ok(Box::new(stub::pose_from_spec(spec)?));
    }
    ensure_exists("pose", path)?;
    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(super::backends::TractPoseEngine::load(
            path,
            settings.pose_input_size,
        )?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        let _ = settings;
        Err(ModelLoadError::BackendUnavailable {
            engine: "pose",
            path: path.to_path_buf(),
        })
    }
}

fn load_classifier(
    path: &Path,
    settings: &ModelSettings,
) -> Result<Box<dyn ClassificationEngine>, ModelLoadError> {
    if let Some(spec) = stub_spec(path) {
        return Ok(Box::new(stub::classifier_from_spec(
            spec,
            &settings.class_labels,
        )?));
    }
    ensure_exists("classifier", path)?;
    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(super::backends::TractClassificationEngine::load(
            path,
            settings.classifier_input_size,
            settings.class_labels.clone(),
        )?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(ModelLoadError::BackendUnavailable {
            engine: "classifier",
            path: path.to_path_buf(),
        })
    }
}

fn ensure_exists(engine: &'static str, path: &Path) -> Result<(), ModelLoadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ModelLoadError::NotFound {
            engine,
            path: path.to_path_buf(),
        })
    }
}
