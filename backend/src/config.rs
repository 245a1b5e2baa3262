use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::yolo::DecodeParams;
use crate::postprocess::labels::DEFAULT_CLASS_LABELS;
use crate::postprocess::{ClassLabelTable, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/segmentation.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub model_path: String,
    pub class_labels: Vec<String>,
    pub confidence_threshold: f32,
    pub retry: RetryConfig,
    /// Wall-clock bound on one request's whole retry sequence.
    pub request_timeout_secs: Option<u64>,
    pub max_concurrent_inferences: usize,
    pub decoder: DecodeParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: "best.torchscript".to_string(),
            class_labels: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            retry: RetryConfig::default(),
            request_timeout_secs: None,
            max_concurrent_inferences: 1,
            decoder: DecodeParams::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl ServiceConfig {
    /// Reads `$SEGMENTATION_CONFIG`, falling back to [`DEFAULT_CONFIG_PATH`]
    /// (built-in defaults when that file is absent), then applies
    /// `MODEL_PATH` from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("SEGMENTATION_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            Err(_) => {
                log::info!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };

        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            config.model_path = model_path;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        log::info!("Loading config from {}", path);
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold {} is not within [0, 1]",
                self.confidence_threshold
            )));
        }
        // Anything below the decoder floor is dropped before it reaches the
        // assembler, so such a threshold would silently not apply.
        if self.confidence_threshold < self.decoder.confidence_floor {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold {} is below decoder.confidence_floor {}",
                self.confidence_threshold, self.decoder.confidence_floor
            )));
        }
        if self.max_concurrent_inferences == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_inferences must be at least 1".into(),
            ));
        }
        if self.decoder.input_size == 0 {
            return Err(ConfigError::Invalid("decoder.input_size must be positive".into()));
        }
        Ok(())
    }

    pub fn label_table(&self) -> ClassLabelTable {
        ClassLabelTable::new(self.class_labels.clone())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
