use crate::error::ConfigError;
use crate::monitor::Thresholds;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Gemini API key
pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Input file location and change polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Which hosted model service answers narrative requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    Ollama,
    Mock,
}

/// Narrative assistant settings. Credentials never live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Model name; each backend has its own default
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Terminal report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_max_trend_rows")]
    pub max_trend_rows: usize,
}

/// Fully resolved backend selection, credentials included
#[derive(Clone, PartialEq)]
pub enum NarrativeBackendConfig {
    Gemini {
        api_key: String,
        model: String,
        endpoint: Option<String>,
    },
    OpenAI {
        api_key: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
    },
    Mock,
}

impl std::fmt::Debug for NarrativeBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini {
                model, endpoint, ..
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"<redacted>")
                .field("model", model)
                .field("endpoint", endpoint)
                .finish(),
            Self::OpenAI {
                model, endpoint, ..
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"<redacted>")
                .field("model", model)
                .field("endpoint", endpoint)
                .finish(),
            Self::Ollama { endpoint, model } => f
                .debug_struct("Ollama")
                .field("endpoint", endpoint)
                .field("model", model)
                .finish(),
            Self::Mock => f.write_str("Mock"),
        }
    }
}

// --- Defaults ---

fn default_dataset_path() -> PathBuf {
    PathBuf::from("iot_worker_conditions_dataset.csv")
}

const fn default_poll_interval() -> u64 {
    2
}

const fn default_backend() -> BackendKind {
    BackendKind::Gemini
}

const fn default_request_timeout() -> u64 {
    60
}

const fn default_max_trend_rows() -> usize {
    20
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: None,
            endpoint: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_trend_rows: default_max_trend_rows(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, and a parse
    /// or validation error if its contents are invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional path
    ///
    /// A missing file falls back to defaults with a warning; a file that exists
    /// but is invalid is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Self::from_file(path) {
                    Ok(config) => Ok(config),
                    Err(ConfigError::ReadError(reason)) if !path.exists() => {
                        warn!(
                            "Configuration file not found ({}), using defaults",
                            reason
                        );
                        Ok(Self::default())
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        if self.dataset.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dataset.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.narrative.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "narrative.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.display.max_trend_rows == 0 {
            return Err(ConfigError::ValidationError(
                "display.max_trend_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl DatasetConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl NarrativeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the backend selection against the process environment
    pub fn resolve(&self) -> Result<NarrativeBackendConfig, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve the backend selection using `lookup` for credentials
    ///
    /// Hosted backends require their API key variable to be set and non-empty;
    /// there is no built-in fallback key.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<NarrativeBackendConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential(var.to_string()))
        };

        let resolved = match self.backend {
            BackendKind::Gemini => NarrativeBackendConfig::Gemini {
                api_key: credential(GOOGLE_API_KEY_VAR)?,
                model: self.model_or("gemini-pro"),
                endpoint: self.endpoint.clone(),
            },
            BackendKind::OpenAI => NarrativeBackendConfig::OpenAI {
                api_key: credential(OPENAI_API_KEY_VAR)?,
                model: self.model_or("gpt-4o-mini"),
                endpoint: self.endpoint.clone(),
            },
            BackendKind::Ollama => NarrativeBackendConfig::Ollama {
                endpoint: self
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                model: self.model_or("llama3"),
            },
            BackendKind::Mock => NarrativeBackendConfig::Mock,
        };
        Ok(resolved)
    }

    fn model_or(&self, default: &str) -> String {
        self.model.clone().unwrap_or_else(|| default.to_string())
    }
}
