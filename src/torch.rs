//! Code for loading and running (trained) TorchScript classifiers

use crate::classifier::{InferenceEngine, ScoreVector};
use crate::error::{ClassifyError, Result};
use crate::preprocess::InputTensor;
use once_cell::sync::OnceCell;
use std::path::Path;
use tch::{no_grad, Device, Kind, Tensor};
use tracing::*;

impl From<tch::TchError> for ClassifyError {
    fn from(err: tch::TchError) -> Self {
        ClassifyError::InferenceFailure(err.to_string())
    }
}

/// A TorchScript module loaded once and shared across requests
#[derive(Debug)]
pub struct TorchEngine {
    /// The loaded torch model
    model: tch::CModule,

    /// Output dimension, discovered by the first probe
    output_len: OnceCell<usize>,
}

impl TorchEngine {
    /// Load a TorchScript file. A missing file is reported as such rather than
    /// as an opaque libtorch error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::File::open(path).map_err(|source| ClassifyError::ResourceMissing {
            what: "model",
            path: path.to_path_buf(),
            source,
        })?;

        let mut model = tch::CModule::load_on_device(path, Device::Cpu)?;
        model.set_eval();
        info!("loaded TorchScript model from {}", path.display());

        Ok(TorchEngine {
            model,
            output_len: OnceCell::new(),
        })
    }

    fn forward(&self, input: &InputTensor) -> Result<ScoreVector> {
        let batch = Tensor::from_slice(input.as_slice()).view(InputTensor::SHAPE);
        let output = no_grad(|| self.model.forward_ts(&[batch]))?;
        let scores = output.to_kind(Kind::Float).flatten(0, -1);
        Ok(Vec::<f32>::try_from(&scores)?)
    }
}

impl InferenceEngine for TorchEngine {
    #[tracing::instrument(skip_all)]
    fn infer(&self, input: &InputTensor) -> Result<ScoreVector> {
        self.forward(input)
    }

    fn output_len(&self) -> Result<usize> {
        self.output_len
            .get_or_try_init(|| {
                let scores = self.forward(&InputTensor::zeros())?;
                debug!("probe forward pass produced {} scores", scores.len());
                Ok(scores.len())
            })
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_resource_missing() {
        let err = TorchEngine::load("/nonexistent/resnet50.pt").unwrap_err();
        assert!(matches!(err, ClassifyError::ResourceMissing { what: "model", .. }));
    }
}
