/*!
 * Process Group Traits
 */

use super::types::{GroupResult, GroupState, JoinReport, StartReport};
use std::time::Duration;

/// Lifecycle of one stage's replicas, independent of its message types
///
/// Lets the orchestrator keep groups with different argument and channel
/// types in one start/join list.
pub trait WorkerGroup: Send {
    fn name(&self) -> &str;

    fn state(&self) -> GroupState;

    /// Replica count requested by the worker spec
    fn requested(&self) -> usize;

    /// Replicas spawned and not yet finished
    fn running(&self) -> usize;

    fn start(&mut self) -> GroupResult<StartReport>;

    fn join(&mut self) -> GroupResult<JoinReport>;

    fn join_timeout(&mut self, timeout: Duration) -> GroupResult<JoinReport>;
}
