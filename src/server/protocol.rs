use serde::{Deserialize, Serialize};

/// Request body of the classify route. `base64Image` may be a bare base64
/// string or a data URI.
#[derive(Deserialize, Default, Clone)]
pub struct ImageRequest {
    #[serde(rename = "base64Image", default)]
    pub base64_image: Option<String>,
}

impl ImageRequest {
    pub fn new(base64_image: impl Into<String>) -> Self {
        ImageRequest {
            base64_image: Some(base64_image.into()),
        }
    }
}

impl std::fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.base64_image {
            Some(image) => write!(f, "ImageRequest {{ base64Image: <{} bytes> }}", image.len()),
            None => write!(f, "ImageRequest {{ base64Image: None }}"),
        }
    }
}

/// Liveness information for the loaded service
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub labels: usize,
    pub version: &'static str,
}
