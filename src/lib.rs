/*!
 * Flight Pipeline Library
 * Worker-pipeline orchestration: shared control signals, bounded channels
 * with a shutdown drain protocol, replica groups, and the orchestrator that
 * ties them together
 */

pub mod channel;
pub mod config;
pub mod control;
pub mod core;
pub mod logging;
pub mod pipeline;
pub mod process;
pub mod worker;

// Re-exports
pub use channel::{Capacity, Channel, ChannelStats, DrainReport, DrainTarget};
pub use config::{ConfigError, PipelineConfig};
pub use control::{ControlSnapshot, ExecutionController};
pub use logging::{init_tracing, Logger, LoggingConfig, LoggingError};
pub use pipeline::{
    MonitorControl, Pipeline, PipelineError, PipelineResult, RunOutcome, ShortfallPolicy,
    ShutdownReport,
};
pub use process::{GroupError, GroupState, JoinReport, ProcessGroup, ReplicaExit, StartReport};
pub use worker::{SpecError, WorkerContext, WorkerSpec};
