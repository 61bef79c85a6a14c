/*!
 * Logging Types
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type LoggingResult<T> = Result<T, LoggingError>;

/// Logging setup errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    #[diagnostic(
        code(logging::invalid_filter),
        help("Use an EnvFilter directive such as 'info' or 'flight_pipeline=debug'.")
    )]
    InvalidFilter { filter: String, reason: String },

    #[error("Tracing subscriber already initialized: {0}")]
    #[diagnostic(
        code(logging::already_initialized),
        help("init_tracing must be called once per process.")
    )]
    AlreadyInitialized(String),

    #[error("Invalid logger name '{0}'")]
    #[diagnostic(
        code(logging::invalid_name),
        help("Logger names must be non-empty and contain no whitespace or control characters.")
    )]
    InvalidName(String),
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, overridden by RUST_LOG when set
    pub filter: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
