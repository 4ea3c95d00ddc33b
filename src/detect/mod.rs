mod backend;
mod backends;

pub use backend::{FaceClassifier, PersonDetection, PersonDetector};
pub use backends::{FixedClassifier, NullClassifier, ScriptedDetector, StubDetector};
