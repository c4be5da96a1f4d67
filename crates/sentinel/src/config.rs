//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Sentinel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    /// Name reported in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// HTTP port for the prediction API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the per-variable regression models
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Optional TOML/JSON file with extra species profiles
    #[serde(default)]
    pub thresholds_file: Option<PathBuf>,

    /// Budget for model inference per request, in milliseconds
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,

    /// Reload models when the model directory changes
    #[serde(default = "default_watch_models")]
    pub watch_models: bool,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "aqua-sentinel".to_string())
}

fn default_api_port() -> u16 {
    8000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_inference_timeout_ms() -> u64 {
    250
}

fn default_watch_models() -> bool {
    true
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            thresholds_file: None,
            inference_timeout_ms: default_inference_timeout_ms(),
            watch_models: default_watch_models(),
        }
    }
}

impl SentinelConfig {
    /// Load configuration from `sentinel.toml` (if present) and `SENTINEL_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from("sentinel")
    }

    /// Load with an explicit config file stem
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("SENTINEL").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Invalid sentinel configuration")?;
        if loaded.inference_timeout_ms == 0 {
            anyhow::bail!("inference_timeout_ms must be positive");
        }
        Ok(loaded)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}
