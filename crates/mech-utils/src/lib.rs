//! Shared utilities for mech-util
//!
//! This crate provides the ambient pieces used across the workspace: tracing
//! setup and the process configuration struct.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, LlmConfig, PromptConfig};
pub use logging::{init_tracing, try_init_tracing};
