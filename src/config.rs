//! Configuration management for Weft
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files and CLI overrides.

use crate::cli::Cli;
use crate::error::{Result, WeftError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Weft
///
/// Holds everything the client needs: where the backend lives, which model
/// drives generation, and the default generation arguments.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Chat behavior settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Default generation arguments sent with every generate request
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the chat backend
    ///
    /// Tests point this at a mock server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model name sent to the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional upstream provider hint forwarded with generate requests
    #[serde(default)]
    pub provider: Option<String>,

    /// Number of chats requested when listing
    #[serde(default = "default_chat_list_limit")]
    pub chat_list_limit: usize,
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_chat_list_limit() -> usize {
    50
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: None,
            chat_list_limit: default_chat_list_limit(),
        }
    }
}

/// Generation arguments
///
/// Serialized verbatim as the `gen_args` field of generate, continue, and
/// regenerate requests. Defaults live in the config file and can be
/// overridden per session through preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling cutoff (0.0 to 1.0)
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Maximum tokens to generate, if the backend supports capping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, then applies CLI overrides
    ///
    /// A missing file is not an error: defaults are used so the client
    /// works out of the box against a local backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed CLI arguments whose overrides take precedence
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>, cli: &Cli) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Config::default()
        };

        config.apply_cli_overrides(cli);
        Ok(config)
    }

    /// Applies CLI argument overrides on top of file values
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(api_base) = &cli.api_base {
            self.api.base_url = api_base.clone();
        }
        if let Some(model) = &cli.model {
            self.chat.model = model.clone();
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `WeftError::Config` when a field is out of range or
    /// unusable.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(WeftError::Config("api.base_url must not be empty".to_string()).into());
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(WeftError::Config(format!(
                "api.base_url must be an http(s) URL, got: {}",
                self.api.base_url
            ))
            .into());
        }
        if self.chat.model.is_empty() {
            return Err(WeftError::Config("chat.model must not be empty".to_string()).into());
        }
        if self.chat.chat_list_limit == 0 {
            return Err(
                WeftError::Config("chat.chat_list_limit must be greater than 0".to_string()).into(),
            );
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(WeftError::Config(format!(
                "generation.temperature must be in [0.0, 2.0], got: {}",
                self.generation.temperature
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(WeftError::Config(format!(
                "generation.top_p must be in [0.0, 1.0], got: {}",
                self.generation.top_p
            ))
            .into());
        }
        Ok(())
    }
}
