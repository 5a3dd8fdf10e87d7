//! Service configuration: built-in defaults, then an optional TOML file, then
//! `IMGCLASSIFY__*` environment variables

use crate::classifier::{ConfidenceMode, PipelineOptions};
use crate::preprocess::Normalization;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "imgclassify.toml";

/// Prefix of environment overrides, e.g. `IMGCLASSIFY__PORT=9000`. The
/// normalization constants take comma separated lists:
/// `IMGCLASSIFY__NORMALIZATION__MEAN=0.485,0.456,0.406`
pub const ENV_PREFIX: &str = "IMGCLASSIFY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    /// TorchScript model file
    pub model_path: PathBuf,

    /// One class name per line, in model output order
    pub labels_path: PathBuf,

    pub normalization: Normalization,
    pub confidence: ConfidenceMode,
    pub inference_timeout_ms: u64,

    /// Largest accepted request body, in bytes
    pub max_payload_bytes: usize,

    /// HTTP worker threads; actix picks one per core when unset
    pub workers: Option<usize>,

    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".into(),
            port: 8080,
            model_path: PathBuf::from("models/resnet50.pt"),
            labels_path: PathBuf::from("models/imagenet_classes.txt"),
            normalization: Normalization::UnitRange,
            confidence: ConfidenceMode::Raw,
            inference_timeout_ms: 30_000,
            max_payload_bytes: 16 * 1024 * 1024,
            workers: None,
            log_level: "info".into(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (required when given) or from
    /// [`DEFAULT_CONFIG_FILE`] if it exists, with environment overrides on top
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("normalization.mean")
                    .with_list_parse_key("normalization.std"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse settings from TOML text, without consulting the environment
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            normalization: self.normalization.clone(),
            confidence: self.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.normalization, Normalization::UnitRange);
        assert_eq!(settings.confidence, ConfidenceMode::Raw);
        assert_eq!(settings.inference_timeout(), Duration::from_secs(30));
        assert!(settings.workers.is_none());
    }

    #[test]
    fn overrides_from_toml() {
        let settings = Settings::from_toml(
            r#"
            port = 9000
            model_path = "/opt/models/resnet18.pt"
            confidence = "softmax"
            inference_timeout_ms = 500
            workers = 2

            [normalization]
            kind = "mean_std"
            mean = [0.485, 0.456, 0.406]
            std = [0.229, 0.224, 0.225]
            "#,
        )
        .unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.model_path, PathBuf::from("/opt/models/resnet18.pt"));
        assert_eq!(settings.labels_path, PathBuf::from("models/imagenet_classes.txt"));
        assert_eq!(settings.confidence, ConfidenceMode::Softmax);
        assert_eq!(settings.inference_timeout_ms, 500);
        assert_eq!(settings.workers, Some(2));
        assert_eq!(settings.normalization, Normalization::imagenet());
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars = [
            ("IMGCLASSIFY__PORT", "9123"),
            ("IMGCLASSIFY__MODEL_PATH", "/srv/models/mobilenet.pt"),
            ("IMGCLASSIFY__NORMALIZATION__KIND", "mean_std"),
            ("IMGCLASSIFY__NORMALIZATION__MEAN", "0.1,0.2,0.3"),
            ("IMGCLASSIFY__NORMALIZATION__STD", "0.5, 0.25,0.125"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let settings = Settings::load(None);
        for (key, _) in vars {
            std::env::remove_var(key);
        }

        let settings = settings.unwrap();
        assert_eq!(settings.port, 9123);
        assert_eq!(settings.model_path, PathBuf::from("/srv/models/mobilenet.pt"));
        assert_eq!(
            settings.normalization,
            Normalization::MeanStd {
                mean: [0.1, 0.2, 0.3],
                std: [0.5, 0.25, 0.125],
            }
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/imgclassify.toml"))).is_err());
    }
}
