//! Error taxonomy for the classification pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between receiving an image and returning a
/// prediction, plus the startup failures that keep the service from serving
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The caller sent something we cannot turn into an image
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A model or label file is absent or unreadable
    #[error("{what} not found at {}: {source}", .path.display())]
    ResourceMissing {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inference runtime rejected the input or failed internally
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// The label table and the model disagree on the number of classes
    #[error("model and labels are inconsistent: {0}")]
    ConsistencyError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClassifyError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ClassifyError::InvalidInput(msg.into())
    }

    /// Whether the failure was caused by the request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClassifyError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_input_is_a_client_error() {
        assert!(ClassifyError::invalid_input("empty").is_client_error());
        assert!(!ClassifyError::InferenceFailure("boom".into()).is_client_error());
        assert!(!ClassifyError::ConsistencyError("1 != 2".into()).is_client_error());
        assert!(!ClassifyError::Internal("cancelled".into()).is_client_error());
    }

    #[test]
    fn resource_missing_names_the_path() {
        let err = ClassifyError::ResourceMissing {
            what: "model",
            path: PathBuf::from("models/resnet50.pt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("model not found at models/resnet50.pt"), "{msg}");
    }
}
