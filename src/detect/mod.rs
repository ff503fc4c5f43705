mod arch;
mod backend;
mod backends;

pub use arch::{ModelArch, DEFAULT_INPUT_SIZE, NUM_CLASSES};
pub use backend::Classifier;
pub use backends::StubClassifier;

#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
