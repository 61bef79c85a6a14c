/*!
 * Configuration Types
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {reason}")]
    #[diagnostic(code(config::read_failed))]
    Read { path: String, reason: String },

    #[error("Failed to parse config file '{path}': {reason}")]
    #[diagnostic(
        code(config::parse_failed),
        help("The config file is JSON; unknown fields are rejected.")
    )]
    Parse { path: String, reason: String },

    #[error("Invalid value '{value}' for environment variable {var}")]
    #[diagnostic(code(config::invalid_env))]
    InvalidEnv { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(config::invalid))]
    Invalid(String),
}
