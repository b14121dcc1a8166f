//! Configuration and settings management
//!
//! Loads application settings from environment variables and the model
//! deployment list from a JSON file.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Lower bound for the max-tokens input field
pub const MIN_MAX_TOKENS: u32 = 100;
/// Upper bound for the max-tokens input field
pub const MAX_MAX_TOKENS: u32 = 4096;
/// Max tokens used when the request does not specify one
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Delay applied before input fields are reported as cleared
pub const RESET_INPUT_DELAY: Duration = Duration::from_secs(1);

/// System message used when neither settings nor the request provide one
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are an AI assistant that helps people find information.";

/// Standing instructions sent with every code-execution agent request
pub const INTERPRETER_INSTRUCTIONS: &str = "If the user does not specify a programming language, \
prefer Python. If the user provides a txt file, read it with UTF-8 encoding. If a file is \
produced, include its full path at the end of the message.";

/// Model name that selects the vision request path
pub const VISION_MODEL_NAME: &str = "GPT4 Vision";
/// Model name that selects the code-execution agent path
pub const CODE_INTERPRETER_MODEL_NAME: &str = "GPT4 Code Interpreter";

const DEFAULT_LLM_HTTP_TIMEOUT_SECS: u64 = 120;

/// Returns the HTTP timeout for one-shot provider calls.
///
/// Uses the `LLM_HTTP_TIMEOUT_SECS` environment variable or the default.
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    std::env::var("LLM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_LLM_HTTP_TIMEOUT_SECS)
}

/// Errors raised while assembling the startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings could not be gathered from the environment
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    /// The model list file is missing or unreadable
    #[error("failed to read model list {path}: {source}")]
    ModelList {
        path: String,
        source: std::io::Error,
    },

    /// The model list file is not a valid JSON array of model entries
    #[error("malformed model list {path}: {source}")]
    ModelListFormat {
        path: String,
        source: serde_json::Error,
    },

    /// The model list parsed but contains no entries
    #[error("model list {0} contains no models")]
    NoModels(String),
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Path to the JSON model deployment list
    #[serde(default = "default_models_path")]
    pub models_path: String,

    /// Address the web server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Port the web server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Page title shown in the chat UI
    #[serde(default = "default_web_name")]
    pub web_name: String,

    /// Default system message
    pub system_message: Option<String>,
}

fn default_models_path() -> String {
    "model_config.json".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    7860
}

fn default_web_name() -> String {
    "Web GPT".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings = s.try_deserialize()?;
        Ok(settings)
    }

    /// System message in effect at startup
    #[must_use]
    pub fn default_system(&self) -> &str {
        self.system_message
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }
}

/// Behavior kind of a configured model deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Streaming chat completion
    Standard,
    /// Single-shot multimodal completion
    Vision,
    /// Delegation to the code-execution agent
    CodeInterpreter,
}

impl ModelKind {
    /// Derive the kind from a configured model name.
    ///
    /// Names other than the two special values select the standard path.
    #[must_use]
    pub fn from_model_name(name: &str) -> Self {
        match name {
            VISION_MODEL_NAME => Self::Vision,
            CODE_INTERPRETER_MODEL_NAME => Self::CodeInterpreter,
            _ => Self::Standard,
        }
    }
}

/// One entry of the model deployment list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unique display name, also the registry key
    pub model_name: String,
    /// Provider base endpoint, e.g. `https://example.openai.azure.com/`
    pub endpoint: String,
    /// Provider API version string
    #[serde(rename = "api-version")]
    pub api_version: String,
    /// API key sent with every request
    pub key: String,
    /// Deployment the requests are routed to
    pub deployment: String,
}

impl ModelConfig {
    /// Behavior kind derived from the model name
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        ModelKind::from_model_name(&self.model_name)
    }
}

/// Load the model deployment list from a JSON file
///
/// # Errors
///
/// Returns a `ConfigError` if the file is missing, malformed, or empty.
pub fn load_models(path: impl AsRef<Path>) -> Result<Vec<ModelConfig>, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ModelList {
        path: path.display().to_string(),
        source,
    })?;

    let models: Vec<ModelConfig> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::ModelListFormat {
            path: path.display().to_string(),
            source,
        })?;

    if models.is_empty() {
        return Err(ConfigError::NoModels(path.display().to_string()));
    }

    Ok(models)
}
