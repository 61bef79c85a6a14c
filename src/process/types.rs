/*!
 * Process Group Types
 * Group state machine, replica outcomes, reports, and errors
 */

use crate::core::types::ReplicaId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type GroupResult<T> = Result<T, GroupError>;

/// Process group errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum GroupError {
    #[error("Cannot reserve {requested} replica slots for '{group}': {reason}")]
    #[diagnostic(
        code(process::resource_exhausted),
        help("Could not allocate bookkeeping for the replicas. Lower the worker count.")
    )]
    ResourceExhausted {
        group: String,
        requested: usize,
        reason: String,
    },

    #[error("Group '{0}' was already started")]
    #[diagnostic(
        code(process::already_started),
        help("A process group starts once. Build a new group from the same spec to run again.")
    )]
    AlreadyStarted(String),

    #[error("Group '{0}' was never started")]
    #[diagnostic(
        code(process::not_started),
        help("Call start() before join().")
    )]
    NotStarted(String),

    #[error("Group '{0}' was already joined")]
    #[diagnostic(code(process::already_joined))]
    AlreadyJoined(String),

    #[error("Group '{group}' still has {pending} running replica(s) after {timeout_ms}ms")]
    #[diagnostic(
        code(process::join_timeout),
        help("A worker is still blocked. Request exit and drain its channels first.")
    )]
    JoinTimeout {
        group: String,
        pending: usize,
        timeout_ms: u64,
    },
}

/// Group lifecycle: `Unstarted -> Running -> Joined`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Unstarted,
    Running,
    Joined,
}

/// How a replica ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum ReplicaExit {
    /// Entry function returned `Ok`
    Completed,
    /// Entry function returned `Err`
    Failed(String),
    /// Entry function panicked
    Panicked(String),
}

impl ReplicaExit {
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A replica the OS refused to spawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnFailure {
    pub replica: ReplicaId,
    pub reason: String,
}

/// Result of `start()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub group: String,
    pub requested: usize,
    pub spawned: usize,
    pub failures: Vec<SpawnFailure>,
}

impl StartReport {
    /// Replicas requested but not running
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.spawned)
    }
}

/// Result of `join()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    pub group: String,
    pub requested: usize,
    pub outcomes: Vec<(ReplicaId, ReplicaExit)>,
}

impl JoinReport {
    pub fn joined(&self) -> usize {
        self.outcomes.len()
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|(_, e)| e.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, e)| matches!(e, ReplicaExit::Failed(_)))
            .count()
    }

    pub fn panicked(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, e)| matches!(e, ReplicaExit::Panicked(_)))
            .count()
    }

    /// Replicas requested that did not complete cleanly
    /// (never spawned, failed, or panicked)
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_report_counts() {
        let report = JoinReport {
            group: "g".to_string(),
            requested: 4,
            outcomes: vec![
                (0, ReplicaExit::Completed),
                (1, ReplicaExit::Failed("boom".into())),
                (3, ReplicaExit::Panicked("oops".into())),
            ],
        };

        assert_eq!(report.joined(), 3);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.panicked(), 1);
        assert_eq!(report.shortfall(), 3);
    }

    #[test]
    fn test_replica_exit_serializes_tagged() {
        let json = serde_json::to_string(&ReplicaExit::Failed("x".into())).unwrap();
        assert_eq!(json, r#"{"outcome":"failed","reason":"x"}"#);
    }
}
