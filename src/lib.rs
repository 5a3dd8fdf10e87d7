pub mod classifier;
pub mod config;
pub mod decode;
pub mod error;
pub mod labels;
pub mod preprocess;
pub mod server;
pub mod startup;
#[cfg(feature = "torch")]
pub mod torch;

pub use classifier::{ImageClassifier, InferenceEngine, Pipeline, Prediction};
pub use error::ClassifyError;
