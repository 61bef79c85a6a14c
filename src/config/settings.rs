/*!
 * Pipeline Settings
 *
 * Everything the binary needs to assemble the flight pipeline: queue sizes,
 * replica counts, timings, and logging. Loaded from JSON, then overridden
 * from the environment.
 *
 * Environment variables:
 * - PIPELINE_RUN_SECS: run duration in seconds
 * - PIPELINE_LOG_JSON: "1"/"true" for JSON log lines, "0"/"false" for compact
 * - RUST_LOG: log filter directive
 */

use super::types::{ConfigError, ConfigResult};
use crate::channel::Capacity;
use crate::core::limits::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_MONITOR_INTERVAL, DEFAULT_RUN_SECS, PAUSE_POLL_INTERVAL,
};
use crate::logging::LoggingConfig;
use crate::pipeline::ShortfallPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_RUN_SECS: &str = "PIPELINE_RUN_SECS";
pub const ENV_LOG_JSON: &str = "PIPELINE_LOG_JSON";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

/// Queue size limits; zero or negative means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueLimits {
    pub heartbeat: i64,
    pub telemetry: i64,
    pub command: i64,
}

impl Default for QueueLimits {
    fn default() -> Self {
        let limit = DEFAULT_CHANNEL_CAPACITY as i64;
        Self {
            heartbeat: limit,
            telemetry: limit,
            command: limit,
        }
    }
}

impl QueueLimits {
    pub fn heartbeat_capacity(&self) -> Capacity {
        Capacity::from_limit(self.heartbeat)
    }

    pub fn telemetry_capacity(&self) -> Capacity {
        Capacity::from_limit(self.telemetry)
    }

    pub fn command_capacity(&self) -> Capacity {
        Capacity::from_limit(self.command)
    }
}

/// Replicas per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerCounts {
    pub heartbeat_sender: usize,
    pub heartbeat_receiver: usize,
    pub telemetry: usize,
    pub command: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            heartbeat_sender: 1,
            heartbeat_receiver: 1,
            telemetry: 1,
            command: 1,
        }
    }
}

impl WorkerCounts {
    fn named(&self) -> [(&'static str, usize); 4] {
        [
            ("heartbeat_sender", self.heartbeat_sender),
            ("heartbeat_receiver", self.heartbeat_receiver),
            ("telemetry", self.telemetry),
            ("command", self.command),
        ]
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Vehicle link address, forwarded opaquely to every stage
    pub connection: String,
    pub queues: QueueLimits,
    pub workers: WorkerCounts,
    pub run_secs: u64,
    /// Upper bound on how long a paused worker sleeps between flag checks
    pub poll_interval_ms: u64,
    pub monitor_interval_ms: u64,
    pub shortfall_policy: ShortfallPolicy,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connection: "tcp:localhost:12345".to_string(),
            queues: QueueLimits::default(),
            workers: WorkerCounts::default(),
            run_secs: DEFAULT_RUN_SECS,
            poll_interval_ms: PAUSE_POLL_INTERVAL.as_millis() as u64,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL.as_millis() as u64,
            shortfall_policy: ShortfallPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %path_str, "Loaded pipeline config");
        Ok(config)
    }

    /// `load`, then environment overrides, then validation
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(value) = std::env::var(ENV_RUN_SECS) {
            self.run_secs = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_RUN_SECS, &value))?;
        }

        if let Ok(value) = std::env::var(ENV_LOG_JSON) {
            self.logging.json = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return Err(invalid_env(ENV_LOG_JSON, &value)),
            };
        }

        if let Ok(value) = std::env::var(ENV_LOG_FILTER) {
            if !value.trim().is_empty() {
                self.logging.filter = value;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some((stage, _)) = self.workers.named().iter().find(|(_, n)| *n == 0) {
            return Err(ConfigError::Invalid(format!(
                "worker count for '{}' must be at least 1",
                stage
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.monitor_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.connection.trim().is_empty() {
            return Err(ConfigError::Invalid("connection must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

fn invalid_env(var: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run_duration(), Duration::from_secs(100));
        assert_eq!(config.queues.heartbeat_capacity(), Capacity::Bounded(10));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = PipelineConfig::default();
        config.workers.telemetry = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("telemetry")
        ));
    }

    #[test]
    fn test_non_positive_limit_is_unbounded() {
        let queues = QueueLimits {
            heartbeat: 0,
            telemetry: -1,
            command: 3,
        };
        assert_eq!(queues.heartbeat_capacity(), Capacity::Unbounded);
        assert_eq!(queues.telemetry_capacity(), Capacity::Unbounded);
        assert_eq!(queues.command_capacity(), Capacity::Bounded(3));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"run_secs": 5, "workers": {"command": 2}}"#).unwrap();
        assert_eq!(config.run_secs, 5);
        assert_eq!(config.workers.command, 2);
        assert_eq!(config.workers.telemetry, 1);
        assert_eq!(config.shortfall_policy, ShortfallPolicy::Abort);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<PipelineConfig, _> = serde_json::from_str(r#"{"runsecs": 5}"#);
        assert!(result.is_err());
    }
}
