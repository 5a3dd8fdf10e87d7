//! HTTP routes: classification and a liveness probe

use super::protocol::{HealthResponse, ImageRequest};
use super::{AppState, WebError};
use crate::classifier::Prediction;
use crate::error::ClassifyError;
use actix_web::{get, post, routes, web, HttpRequest, Responder};
use tracing::*;

type Result<T> = std::result::Result<T, WebError>;

/// Classify one image. Also served under the path older clients were given.
#[routes]
#[post("/classify")]
#[post("/api/ImageClassification/classify")]
pub async fn classify(
    req: web::Json<ImageRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder> {
    Ok(web::Json(run_classification(req.into_inner(), &state).await?))
}

/// Run the pipeline on the blocking pool, bounded by the inference timeout
async fn run_classification(
    request: ImageRequest,
    state: &AppState,
) -> std::result::Result<Prediction, WebError> {
    let classifier = state.classifier.clone();
    let job = web::block(move || classifier.classify(&request));

    let prediction = match tokio::time::timeout(state.inference_timeout, job).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("classification timed out after {:?}", state.inference_timeout);
            Err(ClassifyError::InferenceFailure(format!(
                "timed out after {} ms",
                state.inference_timeout.as_millis()
            )))
        }
    };

    match prediction {
        Ok(prediction) => {
            info!("finished serving classification request");
            Ok(prediction)
        }
        Err(err) if err.is_client_error() => {
            debug!("rejected classification request: {err}");
            Err(err.into())
        }
        Err(err) => {
            error!("classification failed: {err}");
            Err(err.into())
        }
    }
}

/// HTTP request to check that the service is up
#[get("/health")]
pub async fn health(_req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    web::Json(HealthResponse {
        status: "ok",
        labels: state.classes,
        version: env!("CARGO_PKG_VERSION"),
    })
}
