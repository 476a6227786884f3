//! Configuration loading, validation, and management for actloop.
//!
//! Loads configuration from `~/.actloop/config.toml` with environment
//! variable overrides. Validates all settings before the loop is built.

use actloop_core::agent::{LoopConfig, MAX_ITERATIONS_CEILING};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.actloop/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model service connection
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Control loop settings
    #[serde(default)]
    pub agent: LoopConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name reported in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible base URL (Ollama serves one under `/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "ollama".into()
}
fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "llama3.2:3b-instruct-fp16".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Order ID → order details served by `search_orders`
    #[serde(default = "default_orders")]
    pub orders: BTreeMap<String, String>,
}

fn default_orders() -> BTreeMap<String, String> {
    [
        (
            "ORD12345",
            "Order details for 'ORD12345': Status: Shipped, Items: 1x SuperWidget, Delivery Est: Tomorrow. (Source: OMS)",
        ),
        (
            "XYZ987",
            "Order details for 'XYZ987': Status: Processing, Items: 1x HyperGadget. (Source: OMS)",
        ),
        (
            "TEST001",
            "Order details for 'TEST001': Status: Delivered, Items: 1x Sample Product. (Source: OMS)",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            orders: default_orders(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.actloop/config.toml).
    ///
    /// Environment overrides, highest priority:
    /// - `ACTLOOP_BASE_URL`, then `OLLAMA_BASE_URL` (with `/v1` appended)
    /// - `ACTLOOP_MODEL`
    /// - `ACTLOOP_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("ACTLOOP_BASE_URL") {
            self.provider.base_url = url;
        } else if let Some(url) = var("OLLAMA_BASE_URL") {
            self.provider.base_url = format!("{}/v1", url.trim_end_matches('/'));
        }

        if let Some(model) = var("ACTLOOP_MODEL") {
            self.provider.model = model;
        }

        if self.provider.api_key.is_none() {
            self.provider.api_key = var("ACTLOOP_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".actloop")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider.model must not be empty".into()));
        }

        if self.agent.max_iterations == 0 || self.agent.max_iterations > MAX_ITERATIONS_CEILING {
            return Err(ConfigError::ValidationError(format!(
                "agent.max_iterations must be between 1 and {MAX_ITERATIONS_CEILING}"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
