/*!
 * Pipeline Types
 */

use crate::channel::DrainReport;
use crate::process::{GroupError, JoinReport};
use crate::worker::SpecError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Orchestration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Group(#[from] GroupError),

    #[error("Stage '{stage}' started {spawned} of {requested} replicas")]
    #[diagnostic(
        code(pipeline::start_failed),
        help("Startup was rolled back. Check the spawn errors logged for this stage.")
    )]
    StartFailed {
        stage: String,
        requested: usize,
        spawned: usize,
    },

    #[error("Stage '{0}' uses a different execution controller than the pipeline")]
    #[diagnostic(
        code(pipeline::controller_mismatch),
        help("Build every worker spec with the controller passed to Pipeline::new.")
    )]
    ControllerMismatch(String),

    #[error("Stage '{0}' is already registered")]
    #[diagnostic(code(pipeline::duplicate_stage))]
    DuplicateStage(String),

    #[error("Pipeline has no stages")]
    #[diagnostic(code(pipeline::no_stages), help("Register stages with add_stage before start."))]
    NoStages,

    #[error("Pipeline is already running")]
    #[diagnostic(code(pipeline::already_running))]
    AlreadyRunning,

    #[error("Pipeline is not running")]
    #[diagnostic(code(pipeline::not_running), help("Call start() first."))]
    NotRunning,
}

/// What to do when a stage starts with fewer replicas than requested
///
/// A stage with no running replica always aborts startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    #[default]
    Abort,
    Tolerate,
}

/// Returned by the orchestrator's monitor callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorControl {
    Continue,
    Stop,
}

/// Why `Pipeline::run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Run duration elapsed
    Elapsed,
    /// Monitor callback returned `Stop`
    Stopped,
    /// Exit was requested on the controller from elsewhere
    ExitRequested,
}

/// Result of an ordered shutdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub run_id: String,
    /// In drain order (consumer end first)
    pub drains: Vec<DrainReport>,
    /// In join order (reverse of start order)
    pub joins: Vec<JoinReport>,
    pub join_errors: Vec<GroupError>,
    pub elapsed_ms: u64,
}

impl ShutdownReport {
    /// Every drain settled, every group joined, and no replica fell short
    pub fn is_clean(&self) -> bool {
        self.join_errors.is_empty()
            && self.drains.iter().all(|d| d.settled)
            && self.joins.iter().all(|j| j.shortfall() == 0)
    }

    pub fn discarded(&self) -> usize {
        self.drains.iter().map(|d| d.discarded).sum()
    }
}
