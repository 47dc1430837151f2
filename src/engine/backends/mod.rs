pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{CallCounter, StubClassificationEngine, StubPoseEngine};

#[cfg(feature = "backend-tract")]
pub use tract::{TractClassificationEngine, TractPoseEngine};
