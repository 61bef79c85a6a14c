/*!
 * Pipeline Module
 * Orchestration of worker stages: startup, monitoring, and ordered shutdown
 */

mod orchestrator;
mod topology;
mod types;

pub use orchestrator::Pipeline;
pub use topology::{drain_order, StageEdges};
pub use types::{
    MonitorControl, PipelineError, PipelineResult, RunOutcome, ShortfallPolicy, ShutdownReport,
};
