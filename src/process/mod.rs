/*!
 * Process Module
 * Replica groups spawned from a worker spec
 */

mod group;
mod traits;
mod types;

pub use group::ProcessGroup;
pub use traits::WorkerGroup;
pub use types::{
    GroupError, GroupResult, GroupState, JoinReport, ReplicaExit, SpawnFailure, StartReport,
};
