//! Loads the process-wide resources and assembles the shared server state.
//! Any failure here is fatal: the service never binds its socket.

use crate::classifier::{ImageClassifier, InferenceEngine, Pipeline, PipelineOptions};
use crate::config::Settings;
use crate::error::Result;
use crate::labels::LabelTable;
use crate::server::AppState;
use std::path::Path;
use std::sync::Arc;
use tracing::*;

/// Load the label file and wrap `engine` in a validated pipeline
pub fn assemble<E>(
    engine: E,
    labels_path: &Path,
    options: PipelineOptions,
) -> Result<(Arc<dyn ImageClassifier>, usize)>
where
    E: InferenceEngine + 'static,
{
    let labels = LabelTable::from_file(labels_path)?;
    info!("loaded {} labels from {}", labels.len(), labels_path.display());

    let pipeline = Pipeline::new(engine, labels, options)?;
    let classes = pipeline.labels().len();
    Ok((Arc::new(pipeline), classes))
}

/// Build the server state around an already loaded engine
pub fn build_state_with<E>(engine: E, settings: &Settings) -> Result<AppState>
where
    E: InferenceEngine + 'static,
{
    let (classifier, classes) = assemble(engine, &settings.labels_path, settings.pipeline_options())?;
    Ok(AppState {
        classifier,
        classes,
        inference_timeout: settings.inference_timeout(),
        max_payload: settings.max_payload_bytes,
    })
}

/// Load the TorchScript model and label file named in `settings`
#[cfg(feature = "torch")]
pub fn build_state(settings: &Settings) -> Result<AppState> {
    let engine = crate::torch::TorchEngine::load(&settings.model_path)?;
    build_state_with(engine, settings)
}
