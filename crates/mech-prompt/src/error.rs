//! Error types for prompt operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type for prompt operations
pub type Result<T> = std::result::Result<T, PromptError>;

/// Errors that can occur while resolving, loading or rendering a prompt
///
/// Every variant is deterministic for a given template store and input, so
/// none of them is worth retrying.
#[derive(Error, Debug)]
pub enum PromptError {
    /// Identifier is empty, malformed, or would escape the template root
    #[error("Invalid template identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// No template file exists at the path the identifier maps to
    #[error("Template '{identifier}' not found at '{}'", .path.display())]
    TemplateNotFound { identifier: String, path: PathBuf },

    /// Front matter or section markers of a template file are malformed
    #[error("Failed to parse template file '{}': {detail}", .path.display())]
    TemplateParseError { path: PathBuf, detail: String },

    /// One or more placeholders have no value in the rendering context
    #[error("Template '{identifier}' is missing variables: {}", .missing.join(", "))]
    MissingVariable {
        identifier: String,
        missing: Vec<String>,
    },

    /// Rendering context is not a key-value mapping
    #[error("Invalid rendering context: {0}")]
    InvalidContext(String),

    /// Template root directory does not exist
    #[error("Prompt root directory not found: '{}'", .0.display())]
    RootNotFound(PathBuf),

    /// Template engine failed after the context was validated
    #[error("Failed to render template '{identifier}': {detail}")]
    RenderError { identifier: String, detail: String },

    /// Prompt configuration is incomplete or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mech_utils::ConfigError> for PromptError {
    fn from(err: mech_utils::ConfigError) -> Self {
        PromptError::Config(err.to_string())
    }
}

impl PromptError {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub(crate) fn invalid_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::TemplateParseError {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
