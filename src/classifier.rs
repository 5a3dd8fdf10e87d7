//! The classification pipeline: decode, preprocess, infer, resolve.
//!
//! Model execution sits behind [`InferenceEngine`] so the pipeline can run
//! against libtorch in production and a fixed score vector in tests.

use crate::decode::decode_base64_image;
use crate::error::{ClassifyError, Result};
use crate::labels::LabelTable;
use crate::preprocess::{preprocess, InputTensor, Normalization};
use crate::server::protocol::ImageRequest;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::*;

pub use crate::labels::Prediction;

/// Raw class scores, in label-table order
pub type ScoreVector = Vec<f32>;

/// Something that can run the model forward on one input tensor
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, input: &InputTensor) -> Result<ScoreVector>;

    /// Number of scores the model produces per input
    fn output_len(&self) -> Result<usize>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn infer(&self, input: &InputTensor) -> Result<ScoreVector> {
        (**self).infer(input)
    }

    fn output_len(&self) -> Result<usize> {
        (**self).output_len()
    }
}

/// A thing that classifies an image
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, request: &ImageRequest) -> Result<Prediction>;
}

/// What is reported as the prediction's confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    /// The model's score for the winning class, untouched
    #[default]
    Raw,

    /// Softmax probability of the winning class
    Softmax,
}

impl ConfidenceMode {
    fn apply(self, scores: &mut [f32]) {
        if self == ConfidenceMode::Softmax {
            softmax(scores);
        }
    }
}

/// Numerically stable in-place softmax
pub fn softmax(scores: &mut [f32]) {
    let max = scores
        .iter()
        .copied()
        .filter(|s| !s.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0. {
        scores.iter_mut().for_each(|s| *s /= sum);
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub normalization: Normalization,
    pub confidence: ConfidenceMode,
}

/// Image classification over a loaded model and its label table
pub struct Pipeline<E> {
    engine: E,
    labels: Arc<LabelTable>,
    options: PipelineOptions,
}

impl<E: InferenceEngine> Pipeline<E> {
    /// Build the pipeline, refusing a model whose output size does not match
    /// the label table
    pub fn new(engine: E, labels: LabelTable, options: PipelineOptions) -> Result<Self> {
        let outputs = engine.output_len()?;
        if outputs != labels.len() {
            return Err(ClassifyError::ConsistencyError(format!(
                "model has {outputs} outputs but the label file has {} entries",
                labels.len()
            )));
        }
        info!(classes = outputs, ?options, "classification pipeline ready");

        Ok(Pipeline {
            engine,
            labels: Arc::new(labels),
            options,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Classify an already decoded image
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn classify_image(&self, image: image::RgbImage) -> Result<Prediction> {
        let start = Instant::now();
        let input = preprocess(image, &self.options.normalization);
        debug!("preprocessed in {:?}", start.elapsed());

        let start = Instant::now();
        let mut scores = self.engine.infer(&input)?;
        debug!("inference took {:?}", start.elapsed());

        self.options.confidence.apply(&mut scores);
        self.labels.resolve(&scores)
    }
}

impl<E: InferenceEngine> ImageClassifier for Pipeline<E> {
    #[tracing::instrument(skip(self))]
    fn classify(&self, request: &ImageRequest) -> Result<Prediction> {
        let payload = request.base64_image.as_deref().unwrap_or_default();
        let image = decode_base64_image(payload)?;
        let prediction = self.classify_image(image)?;
        info!(label = %prediction.label, confidence = prediction.confidence, "classified image");
        Ok(prediction)
    }
}
