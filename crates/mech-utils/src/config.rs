//! Configuration management utilities
//!
//! Configuration is read once at process start into a [`Config`] value and
//! handed to whatever needs it. Nothing below reads the environment on its
//! own; use [`Config::from_env`] at the edge, or [`Config::from_lookup`] with
//! any key lookup (tests pass a map).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Environment key for the prompt template root
pub const PROMPTS_DIR_ENV: &str = "PROMPTS_DIR";

const DEFAULT_API_BASE: &str = "http://localhost:8000/v1";
const DEFAULT_MODEL: &str = "default";

/// Errors raised while building configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key has no value
    #[error("Missing configuration: {0} is not set")]
    Missing(String),

    /// A key is set but its value does not parse
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Result type for configuration
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Prompt template settings
    #[serde(default)]
    pub prompts: PromptConfig,
    /// Chat-completion endpoint settings
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "mech-util".to_string(),
            environment: "development".to_string(),
            prompts: PromptConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            app_name: lookup("MECH_APP_NAME").unwrap_or(defaults.app_name),
            environment: lookup("MECH_ENVIRONMENT").unwrap_or(defaults.environment),
            prompts: PromptConfig::from_lookup(&lookup)?,
            llm: LlmConfig::from_lookup(&lookup)?,
        })
    }
}

/// Where prompt templates live and how they are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Template root directory (`PROMPTS_DIR`)
    pub prompts_dir: Option<PathBuf>,
    /// Keep parsed templates in memory between renders (`PROMPTS_CACHE`)
    pub cache: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompts_dir: None,
            cache: true,
        }
    }
}

impl PromptConfig {
    /// Config rooted at an explicit directory
    pub fn with_dir(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: Some(prompts_dir.into()),
            ..Self::default()
        }
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            prompts_dir: lookup(PROMPTS_DIR_ENV)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            cache: parse_or(&lookup, "PROMPTS_CACHE", true)?,
        })
    }

    /// The template root, or an error naming the variable to set
    pub fn require_dir(&self) -> Result<&PathBuf> {
        self.prompts_dir
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(PROMPTS_DIR_ENV.to_string()))
    }
}

/// Settings for an OpenAI-compatible chat endpoint
///
/// Only carried here; the client that uses it lives with the agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL (`LLM_API_BASE`)
    pub api_base: String,
    /// Model name (`LLM_MODEL_NAME`)
    pub model: String,
    /// Sampling temperature (`LLM_TEMPERATURE`)
    pub temperature: f32,
    /// Request timeout in seconds (`LLM_TIMEOUT_SECS`)
    pub timeout_secs: u64,
    /// Retry attempts for failed requests (`LLM_MAX_RETRIES`)
    pub max_retries: u32,
    /// Generation cap (`LLM_MAX_TOKENS`)
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            timeout_secs: 300,
            max_retries: 2,
            max_tokens: 4096,
        }
    }
}

impl LlmConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            api_base: lookup("LLM_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            model: lookup("LLM_MODEL_NAME").unwrap_or(defaults.model),
            temperature: parse_or(&lookup, "LLM_TEMPERATURE", defaults.temperature)?,
            timeout_secs: parse_or(&lookup, "LLM_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", defaults.max_retries)?,
            max_tokens: parse_or(&lookup, "LLM_MAX_TOKENS", defaults.max_tokens)?,
        })
    }

    /// Set the base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Qwen3 models need their thinking mode switched off for plain completions
    pub fn disables_thinking(&self) -> bool {
        self.model.to_lowercase().contains("qwen3")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
