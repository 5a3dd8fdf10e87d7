//! Turns the base64 payload of a request into an RGB pixel grid

use crate::error::{ClassifyError, Result};
use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;

/// Drop a data-URI header such as `data:image/png;base64,`. Everything up to
/// and including the first comma is removed; payloads without a comma are
/// returned as-is.
pub fn strip_data_uri(payload: &str) -> &str {
    let payload = payload.trim();
    match payload.split_once(',') {
        Some((_, data)) => data.trim(),
        None => payload,
    }
}

/// Decode a (possibly data-URI prefixed) base64 string into an RGB image
pub fn decode_base64_image(payload: &str) -> Result<RgbImage> {
    let data = strip_data_uri(payload);
    if data.is_empty() {
        return Err(ClassifyError::invalid_input("a base64 encoded image is required"));
    }

    // Line-wrapped base64 is common from browsers and CLI tools
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ClassifyError::invalid_input(format!("malformed base64: {e}")))?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| ClassifyError::invalid_input(format!("could not decode image: {e}")))?;

    Ok(image.to_rgb8())
}
