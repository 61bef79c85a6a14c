/*!
 * Named Logger
 *
 * Lightweight handle carrying a worker or orchestrator name. Every record is
 * emitted through `tracing` inside the logger's span, so the name shows up as
 * structured context regardless of the subscriber format.
 */

use super::types::{LoggingError, LoggingResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Span};

#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    span: Span,
}

impl Logger {
    /// Fallible constructor; rejects empty names and names with whitespace
    pub fn create(name: impl Into<String>) -> LoggingResult<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LoggingError::InvalidName(name));
        }

        let span = info_span!("logger", name = %name);
        Ok(Self {
            name: Arc::from(name),
            span,
        })
    }

    /// Logger for one replica, named `<name>_<index>`
    pub fn for_replica(&self, index: usize) -> Self {
        let name = format!("{}_{}", self.name, index);
        let span = info_span!(parent: &self.span, "replica", name = %name, index);
        Self {
            name: Arc::from(name),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.span.in_scope(|| debug!(logger = %self.name, "{}", message));
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.span.in_scope(|| info!(logger = %self.name, "{}", message));
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.span.in_scope(|| warn!(logger = %self.name, "{}", message));
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.span.in_scope(|| error!(logger = %self.name, "{}", message));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_bad_names() {
        assert!(matches!(Logger::create(""), Err(LoggingError::InvalidName(_))));
        assert!(Logger::create("has space").is_err());
        assert!(Logger::create("tab\tname").is_err());
    }

    #[test]
    fn test_replica_logger_name() {
        let logger = Logger::create("telemetry").unwrap();
        let replica = logger.for_replica(2);
        assert_eq!(replica.name(), "telemetry_2");
        replica.info("replica logger works without a subscriber");
    }
}
