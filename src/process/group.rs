/*!
 * Process Group
 *
 * Owns the replicas spawned from one worker spec. Each replica runs the
 * spec's entry function on its own named OS thread.
 *
 * # Lifecycle
 *
 * `Unstarted -> Running -> Joined`. `start()` is the only way into
 * `Running` and `join()` the only way out. Calling `join()` before
 * `start()` fails fast with `GroupError::NotStarted`.
 *
 * # Hazard
 *
 * `join()` waits for every replica. Call it only after the controller's exit
 * has been requested and the channels the replicas block on have been
 * drained, otherwise a replica parked in `enqueue`/`dequeue`/`check_pause`
 * keeps `join()` waiting.
 */

use super::traits::WorkerGroup;
use super::types::{
    GroupError, GroupResult, GroupState, JoinReport, ReplicaExit, SpawnFailure, StartReport,
};
use crate::core::limits::JOIN_POLL_INTERVAL;
use crate::core::types::ReplicaId;
use crate::logging::Logger;
use crate::worker::{WorkerContext, WorkerFn, WorkerSpec};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

struct Replica {
    id: ReplicaId,
    handle: JoinHandle<ReplicaExit>,
}

/// Replicas of one pipeline stage
pub struct ProcessGroup<A, I, O> {
    spec: WorkerSpec<A, I, O>,
    replicas: Vec<Replica>,
    state: GroupState,
    #[cfg(test)]
    refuse_spawn: Vec<ReplicaId>,
}

impl<A, I, O> ProcessGroup<A, I, O>
where
    A: Clone + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    /// Describe the replicas of `spec` without spawning them
    ///
    /// Fails if the replica bookkeeping cannot be allocated.
    pub fn create(spec: &WorkerSpec<A, I, O>) -> GroupResult<Self> {
        let mut replicas = Vec::new();
        replicas
            .try_reserve_exact(spec.replicas())
            .map_err(|e| GroupError::ResourceExhausted {
                group: spec.name().to_string(),
                requested: spec.replicas(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            spec: spec.clone(),
            replicas,
            state: GroupState::Unstarted,
            #[cfg(test)]
            refuse_spawn: Vec::new(),
        })
    }

    pub fn spec(&self) -> &WorkerSpec<A, I, O> {
        &self.spec
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Spawned replica ids, in spawn order
    pub fn replica_ids(&self) -> Vec<ReplicaId> {
        self.replicas.iter().map(|r| r.id).collect()
    }

    /// Spawn every replica (best effort)
    ///
    /// A replica that fails to spawn is logged, left out of the group, and
    /// reported in `StartReport::failures`. Replicas already spawned keep
    /// running.
    pub fn start(&mut self) -> GroupResult<StartReport> {
        if self.state != GroupState::Unstarted {
            return Err(GroupError::AlreadyStarted(self.spec.name().to_string()));
        }

        let name = self.spec.name().to_string();
        let requested = self.spec.replicas();
        let mut failures = Vec::new();

        for id in 0..requested {
            match self.spawn_replica(id) {
                Ok(handle) => self.replicas.push(Replica { id, handle }),
                Err(e) => {
                    warn!(group = %name, replica = id, error = %e, "Failed to spawn replica");
                    failures.push(SpawnFailure {
                        replica: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.state = GroupState::Running;

        let report = StartReport {
            group: name,
            requested,
            spawned: self.replicas.len(),
            failures,
        };

        if report.shortfall() > 0 {
            warn!(
                group = %report.group,
                requested,
                spawned = report.spawned,
                "Group started with a replica shortfall"
            );
        } else {
            info!(group = %report.group, replicas = report.spawned, "Group started");
        }

        Ok(report)
    }

    /// Wait for every spawned replica to terminate
    pub fn join(&mut self) -> GroupResult<JoinReport> {
        self.ensure_running()?;

        let name = self.spec.name().to_string();
        let mut outcomes = Vec::with_capacity(self.replicas.len());

        for replica in self.replicas.drain(..) {
            let exit = match replica.handle.join() {
                Ok(exit) => exit,
                Err(payload) => ReplicaExit::Panicked(panic_message(payload.as_ref())),
            };
            outcomes.push((replica.id, exit));
        }

        self.state = GroupState::Joined;

        let report = JoinReport {
            group: name,
            requested: self.spec.replicas(),
            outcomes,
        };

        if report.shortfall() > 0 {
            warn!(
                group = %report.group,
                requested = report.requested,
                completed = report.completed(),
                failed = report.failed(),
                panicked = report.panicked(),
                "Group joined with a replica shortfall"
            );
        } else {
            info!(group = %report.group, replicas = report.joined(), "Group joined");
        }

        Ok(report)
    }

    /// Join if every replica finishes within `timeout`
    ///
    /// On timeout the group stays `Running` and can be joined again later.
    pub fn join_timeout(&mut self, timeout: Duration) -> GroupResult<JoinReport> {
        self.ensure_running()?;

        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.running();
            if pending == 0 {
                return self.join();
            }
            if Instant::now() >= deadline {
                return Err(GroupError::JoinTimeout {
                    group: self.spec.name().to_string(),
                    pending,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    /// Spawned replicas not yet reaped by `join()`
    pub fn unjoined(&self) -> usize {
        self.replicas.len()
    }

    /// Spawned replicas that have not finished yet
    pub fn running(&self) -> usize {
        self.replicas
            .iter()
            .filter(|r| !r.handle.is_finished())
            .count()
    }

    fn ensure_running(&self) -> GroupResult<()> {
        match self.state {
            GroupState::Running => Ok(()),
            GroupState::Unstarted => Err(GroupError::NotStarted(self.spec.name().to_string())),
            GroupState::Joined => Err(GroupError::AlreadyJoined(self.spec.name().to_string())),
        }
    }

    fn spawn_replica(&self, id: ReplicaId) -> io::Result<JoinHandle<ReplicaExit>> {
        #[cfg(test)]
        if self.refuse_spawn.contains(&id) {
            return Err(io::Error::new(io::ErrorKind::Other, "spawn refused"));
        }

        let entry = self.spec.entry();
        let context = self.spec.context(id);

        thread::Builder::new()
            .name(format!("{}-{}", self.spec.name(), id))
            .spawn(move || run_replica(entry, context))
    }
}

impl<A, I, O> WorkerGroup for ProcessGroup<A, I, O>
where
    A: Clone + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        self.spec.name()
    }

    fn state(&self) -> GroupState {
        self.state
    }

    fn requested(&self) -> usize {
        self.spec.replicas()
    }

    fn running(&self) -> usize {
        ProcessGroup::running(self)
    }

    fn start(&mut self) -> GroupResult<StartReport> {
        ProcessGroup::start(self)
    }

    fn join(&mut self) -> GroupResult<JoinReport> {
        ProcessGroup::join(self)
    }

    fn join_timeout(&mut self, timeout: Duration) -> GroupResult<JoinReport> {
        ProcessGroup::join_timeout(self, timeout)
    }
}

impl<A, I, O> Drop for ProcessGroup<A, I, O> {
    fn drop(&mut self) {
        if self.state != GroupState::Running || self.replicas.is_empty() {
            return;
        }
        let still_running = self
            .replicas
            .iter()
            .filter(|r| !r.handle.is_finished())
            .count();
        warn!(
            group = %self.spec.name(),
            unjoined = self.replicas.len(),
            still_running,
            "Process group dropped without join, detaching replicas"
        );
    }
}

/// Replica thread body: run the entry function and classify how it ended
fn run_replica<A, I, O>(entry: WorkerFn<A, I, O>, context: WorkerContext<A, I, O>) -> ReplicaExit {
    let logger: Logger = context.logger.clone();
    logger.info("Replica started");

    match panic::catch_unwind(AssertUnwindSafe(|| entry(context))) {
        Ok(Ok(())) => {
            logger.info("Replica exited");
            ReplicaExit::Completed
        }
        Ok(Err(e)) => {
            let reason = format!("{:#}", e);
            logger.error(format_args!("Replica failed: {}", reason));
            ReplicaExit::Failed(reason)
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            logger.error(format_args!("Replica panicked: {}", reason));
            ReplicaExit::Panicked(reason)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
