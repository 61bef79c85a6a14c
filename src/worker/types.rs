/*!
 * Worker Types
 * Entry function shape, replica context, and construction errors
 */

use crate::channel::Channel;
use crate::control::ExecutionController;
use crate::core::types::ReplicaId;
use crate::logging::Logger;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub type SpecResult<T> = Result<T, SpecError>;

/// Worker description construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum SpecError {
    #[error("Invalid replica count {0}: at least one replica is required")]
    #[diagnostic(
        code(worker::invalid_replica_count),
        help("Set the stage's worker count to 1 or more.")
    )]
    InvalidReplicaCount(usize),

    #[error("Missing required dependency: {0}")]
    #[diagnostic(
        code(worker::missing_dependency),
        help("Provide the dependency on the builder before calling build().")
    )]
    MissingDependency(String),

    #[error("Invalid stage name '{0}'")]
    #[diagnostic(
        code(worker::invalid_name),
        help("Stage names must be non-empty and contain no whitespace.")
    )]
    InvalidName(String),
}

/// Worker entry function
///
/// Each replica calls it once with its own context and is expected to loop
/// until exit is requested. Every blocking call inside it must carry a
/// bounded timeout so the loop keeps polling the controller. An `Err` is
/// logged and the replica counts as failed.
pub type WorkerFn<A, I, O> =
    Arc<dyn Fn(WorkerContext<A, I, O>) -> anyhow::Result<()> + Send + Sync + 'static>;

/// Everything a single replica receives
pub struct WorkerContext<A, I, O> {
    pub args: A,
    pub inputs: Vec<Channel<I>>,
    pub outputs: Vec<Channel<O>>,
    pub controller: ExecutionController,
    pub logger: Logger,
    pub replica: ReplicaId,
}

impl<A, I, O> WorkerContext<A, I, O> {
    /// Loop guard for worker bodies
    ///
    /// Returns false once exit is requested; otherwise honours a pause first.
    ///
    /// ```ignore
    /// while ctx.poll() {
    ///     // one unit of work
    /// }
    /// ```
    pub fn poll(&self) -> bool {
        if self.controller.is_exit_requested() {
            return false;
        }
        self.controller.check_pause();
        !self.controller.is_exit_requested()
    }

    pub fn input(&self, index: usize) -> Option<&Channel<I>> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Channel<O>> {
        self.outputs.get(index)
    }
}
