/*!
 * Config Module
 * Pipeline configuration file and environment overrides
 */

mod settings;
mod types;

pub use settings::{
    PipelineConfig, QueueLimits, WorkerCounts, ENV_LOG_FILTER, ENV_LOG_JSON, ENV_RUN_SECS,
};
pub use types::{ConfigError, ConfigResult};
