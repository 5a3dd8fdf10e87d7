//! The user-facing JSON web server. Request handlers live in [`routes`]; this
//! module holds the shared state and the mapping from pipeline errors to HTTP
//! responses.

use crate::classifier::ImageClassifier;
use crate::error::ClassifyError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod protocol;
pub mod routes;

#[derive(Debug)]
pub struct WebError {
    err: ClassifyError,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let err = HashMap::from([("errors", vec![self.to_string()])]);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(err)
    }

    fn status_code(&self) -> StatusCode {
        if self.err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ClassifyError> for WebError {
    fn from(err: ClassifyError) -> WebError {
        WebError { err }
    }
}

impl From<actix_web::error::BlockingError> for WebError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        WebError {
            err: ClassifyError::Internal(err.to_string()),
        }
    }
}

/// State shared by every request, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn ImageClassifier>,
    /// Number of classes the model knows
    pub classes: usize,
    pub inference_timeout: Duration,
    /// Largest accepted JSON body, in bytes
    pub max_payload: usize,
}

/// Register the routes and their state on an `App`
pub fn configure(state: AppState) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        let json = web::JsonConfig::default()
            .limit(state.max_payload)
            .error_handler(|err, _req| {
                WebError::from(ClassifyError::invalid_input(format!("bad request body: {err}")))
                    .into()
            });

        cfg.app_data(web::Data::new(state.clone()))
            .app_data(json)
            .service(routes::classify)
            .service(routes::health);
    }
}
