mod backend;
mod backends;
mod loader;

pub use backend::{ClassificationEngine, PoseEngine, RawClassification, RawKeypoint, RawPose};
pub use backends::{CallCounter, StubClassificationEngine, StubPoseEngine};
#[cfg(feature = "backend-tract")]
pub use backends::{TractClassificationEngine, TractPoseEngine};
pub use loader::{load_engines, Engines, STUB_SCHEME};
