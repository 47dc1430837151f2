#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::engine::backend::{
    ClassificationEngine, PoseEngine, RawClassification, RawKeypoint, RawPose,
};
use crate::error::{InferenceFailure, ModelLoadError};
use crate::input::AnalysisImage;
use crate::keypoint::LANDMARK_COUNT;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// YOLO-pose rows per anchor: cx, cy, w, h, score, then (x, y, conf) per landmark.
const POSE_HEADER_ROWS: usize = 5;

fn load_plan(engine: &'static str, path: &Path, input_size: u32) -> Result<Plan, ModelLoadError> {
    let backend_err = |reason: String| ModelLoadError::Backend {
        engine,
        path: path.to_path_buf(),
        reason,
    };
    let size = input_size as usize;
    tract_onnx::onnx()
        .model_for_path(path)
        .map_err(|e| backend_err(format!("failed to read ONNX model: {e}")))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
        )
        .map_err(|e| backend_err(format!("failed to set input fact: {e}")))?
        .into_optimized()
        .map_err(|e| backend_err(format!("failed to optimize model: {e}")))?
        .into_runnable()
        .map_err(|e| backend_err(format!("failed to build runnable model: {e}")))
}

/// Resize to a square NCHW tensor with channels scaled to [0, 1].
fn image_tensor(image: &AnalysisImage, input_size: u32) -> Tensor {
    let resized = imageops::resize(image.pixels(), input_size, input_size, FilterType::Triangle);
    let size = input_size as usize;
    tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
        resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
    })
    .into_tensor()
}

fn run(
    plan: &Plan,
    engine: &'static str,
    input: Tensor,
) -> Result<TVec<TValue>, InferenceFailure> {
    plan.run(tvec!(input.into()))
        .map_err(|e| InferenceFailure::engine(engine, format!("ONNX inference failed: {e}")))
}

/// YOLO-pose ONNX model (`[1, 5 + 3K, anchors]` output).
pub struct TractPoseEngine {
    plan: Plan,
    input_size: u32,
    landmark_count: usize,
}

impl TractPoseEngine {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self, ModelLoadError> {
        let model_path = model_path.as_ref();
        let plan = load_plan("pose", model_path, input_size)?;
        let landmark_count = declared_landmark_count(&plan).unwrap_or(LANDMARK_COUNT);
        log::info!(
            "loaded pose model {} ({} landmarks, input {}x{})",
            model_path.display(),
            landmark_count,
            input_size,
            input_size
        );
        Ok(Self {
            plan,
            input_size,
            landmark_count,
        })
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        image: &AnalysisImage,
    ) -> Result<Option<RawPose>, InferenceFailure> {
        let output = outputs
            .first()
            .ok_or_else(|| InferenceFailure::malformed("pose", "model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceFailure::malformed("pose", format!("output was not f32: {e}")))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| {
                InferenceFailure::malformed("pose", format!("expected rank-3 output: {e}"))
            })?;

        let (rows, anchors) = (view.shape()[1], view.shape()[2]);
        if rows < POSE_HEADER_ROWS || (rows - POSE_HEADER_ROWS) % 3 != 0 {
            return Err(InferenceFailure::malformed(
                "pose",
                format!("{rows} rows per anchor is not a keypoint layout"),
            ));
        }
        let count = (rows - POSE_HEADER_ROWS) / 3;
        if count != self.landmark_count {
            return Err(InferenceFailure::malformed(
                "pose",
                format!("{count} landmarks in output, model declared {}", self.landmark_count),
            ));
        }

        let best = (0..anchors)
            .map(|anchor| (anchor, view[(0, 4, anchor)]))
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((anchor, score)) = best else {
            return Ok(None);
        };
        if score <= 0.0 {
            return Ok(None);
        }

        let scale_x = image.width() as f32 / self.input_size as f32;
        let scale_y = image.height() as f32 / self.input_size as f32;
        let keypoints = (0..count)
            .map(|index| {
                let row = POSE_HEADER_ROWS + index * 3;
                RawKeypoint {
                    index,
                    x: view[(0, row, anchor)] * scale_x,
                    y: view[(0, row + 1, anchor)] * scale_y,
                    confidence: view[(0, row + 2, anchor)].clamp(0.0, 1.0),
                }
            })
            .collect();

        Ok(Some(RawPose {
            keypoints,
            overall_confidence: f64::from(score.min(1.0)),
        }))
    }
}

fn declared_landmark_count(plan: &Plan) -> Option<usize> {
    let fact = plan.model().output_fact(0).ok()?;
    let shape = fact.shape.as_concrete()?;
    let rows = *shape.get(1)?;
    (shape.len() == 3 && rows >= POSE_HEADER_ROWS && (rows - POSE_HEADER_ROWS) % 3 == 0)
        .then(|| (rows - POSE_HEADER_ROWS) / 3)
}

impl PoseEngine for TractPoseEngine {
    fn name(&self) -> &'static str {
        "tract-pose"
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    fn infer(&mut self, image: &AnalysisImage) -> Result<Option<RawPose>, InferenceFailure> {
        let input = image_tensor(image, self.input_size);
        let outputs = run(&self.plan, "pose", input)?;
        self.decode(outputs, image)
    }
}

/// Image classifier ONNX model (`[1, classes]` output).
pub struct TractClassificationEngine {
    plan: Plan,
    input_size: u32,
    labels: Vec<String>,
}

impl TractClassificationEngine {
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        labels: Vec<String>,
    ) -> Result<Self, ModelLoadError> {
        let model_path = model_path.as_ref();
        let plan = load_plan("classifier", model_path, input_size)?;
        ensure_label_count(declared_class_count(&plan), labels.len()).map_err(|reason| {
            ModelLoadError::Backend {
                engine: "classifier",
                path: model_path.to_path_buf(),
                reason,
            }
        })?;
        log::info!(
            "loaded classifier model {} ({} classes, input {}x{})",
            model_path.display(),
            labels.len(),
            input_size,
            input_size
        );
        Ok(Self {
            plan,
            input_size,
            labels,
        })
    }
}

impl ClassificationEngine for TractClassificationEngine {
    fn name(&self) -> &'static str {
        "tract-classifier"
    }

    fn infer(&mut self, image: &AnalysisImage) -> Result<RawClassification, InferenceFailure> {
        let input = image_tensor(image, self.input_size);
        let outputs = run(&self.plan, "classifier", input)?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceFailure::malformed("classifier", "model produced no outputs"))?;
        let scores: Vec<f64> = output
            .to_array_view::<f32>()
            .map_err(|e| {
                InferenceFailure::malformed("classifier", format!("output was not f32: {e}"))
            })?
            .iter()
            .map(|score| f64::from(*score))
            .collect();
        RawClassification::from_probabilities(&self.labels, &normalize(scores))
    }
}

fn declared_class_count(plan: &Plan) -> Option<usize> {
    let fact = plan.model().output_fact(0).ok()?;
    class_count(fact.shape.as_concrete()?)
}

/// Class count of a `[1, .., C]` output shape.
fn class_count(shape: &[usize]) -> Option<usize> {
    let (&classes, batch) = shape.split_last()?;
    batch.iter().all(|&dim| dim == 1).then_some(classes)
}

fn ensure_label_count(declared: Option<usize>, labels: usize) -> Result<(), String> {
    match declared {
        Some(classes) if classes != labels => Err(format!(
            "model outputs {classes} classes but {labels} class labels are configured"
        )),
        _ => Ok(()),
    }
}

/// Softmax unless the scores already form a probability distribution.
fn normalize(scores: Vec<f64>) -> Vec<f64> {
    let is_distribution = scores.iter().all(|p| (0.0..=1.0).contains(p))
        && (scores.iter().sum::<f64>() - 1.0).abs() < 1e-3;
    if is_distribution || scores.is_empty() {
        return scores;
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
