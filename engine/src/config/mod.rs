//! Configuration management
//!
//! This module handles loading, validation, and management of the ReqLab
//! configuration. Configuration is stored in TOML format at
//! ~/.reqlab/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Artifact output directory and log level
//! - **llm**: Chat backend selection and per-backend settings
//! - **chat**: Group chat behaviour (streaming, step guard, manager agent)
//!
//! API keys are never stored here; see [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use reqlab_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Artifacts: {:?}", config.core.output_dir);
//! println!("Backend: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Providers accepted in `llm.default_provider`
pub const VALID_PROVIDERS: [&str; 3] = ["openai", "azure", "ollama"];

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Chat backend configuration
    pub llm: LLMConfig,

    /// Group chat behaviour
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Root directory for generated artifacts (supports ~ expansion)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Chat backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Backend used by every agent (openai, azure, ollama)
    pub default_provider: String,

    /// OpenAI-compatible backend settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Azure OpenAI backend settings
    #[serde(default)]
    pub azure: AzureConfig,

    /// Ollama backend settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
    // Note: API key read from OPENAI_API_KEY or the OS keychain
}

/// Azure OpenAI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. https://my-resource.openai.azure.com
    #[serde(default)]
    pub endpoint: String,

    /// Deployment name
    #[serde(default = "default_azure_deployment")]
    pub deployment: String,

    /// REST API version
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
    // Note: API key read from AZURE_OPENAI_API_KEY or the OS keychain
}

/// Ollama backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Group chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Stream agent replies token by token
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Upper bound on agent steps the CLI runs per user message
    #[serde(default = "default_max_steps_per_turn")]
    pub max_steps_per_turn: usize,

    /// Add the Manager agent to the roster
    #[serde(default)]
    pub include_manager: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            max_steps_per_turn: default_max_steps_per_turn(),
            include_manager: false,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/.reqlab/generated")
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_azure_deployment() -> String {
    "gpt-4o".to_string()
}

fn default_azure_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_steps_per_turn() -> usize {
    8
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: default_azure_deployment(),
            api_version: default_azure_api_version(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.reqlab/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read or parsed, or
    /// if validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable ~ path
        let default = Self::default_config();
        let toml_string = toml::to_string_pretty(&default)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = default;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.reqlab/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".reqlab").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                output_dir: default_output_dir(),
                log_level: default_log_level(),
            },
            llm: LLMConfig {
                default_provider: "openai".to_string(),
                openai: OpenAIConfig::default(),
                azure: AzureConfig::default(),
                ollama: OllamaConfig::default(),
            },
            chat: ChatConfig::default(),
        }
    }

    /// Validate and process configuration
    ///
    /// Validates enumerated fields and expands ~ in the output directory. The
    /// output directory itself is created lazily by the artifact extractor.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        if !VALID_LOG_LEVELS.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if !VALID_PROVIDERS.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                VALID_PROVIDERS.join(", ")
            )));
        }

        if self.llm.default_provider == "azure" && self.llm.azure.endpoint.trim().is_empty() {
            return Err(EngineError::Config(
                "llm.azure.endpoint is required when default_provider is 'azure'".to_string(),
            ));
        }

        if self.chat.max_steps_per_turn == 0 {
            return Err(EngineError::Config(
                "chat.max_steps_per_turn must be at least 1".to_string(),
            ));
        }

        self.core.output_dir = expand_path(&self.core.output_dir)?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
