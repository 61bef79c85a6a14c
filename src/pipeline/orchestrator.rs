/*!
 * Pipeline Orchestrator
 *
 * Wires worker specs into a pipeline, starts one process group per stage,
 * runs the orchestrator's own monitor loop, and executes the shutdown
 * sequence:
 *
 * 1. `request_exit()` on the shared controller
 * 2. drain every channel, consumer end first (see `topology`)
 * 3. join every group in reverse start order
 * 4. `clear_exit()` and reopen the channels so the pipeline can run again
 *
 * Startup is all-or-nothing: if a stage cannot start, the groups already
 * running are shut down with the same sequence before the error returns.
 */

use super::topology::{drain_order, StageEdges};
use super::types::{
    MonitorControl, PipelineError, PipelineResult, RunOutcome, ShortfallPolicy, ShutdownReport,
};
use crate::channel::{Channel, ChannelStats, DrainTarget};
use crate::control::ExecutionController;
use crate::core::limits::DEFAULT_MONITOR_INTERVAL;
use crate::core::types::ChannelId;
use crate::logging::{generate_run_id, Logger};
use crate::process::{GroupResult, ProcessGroup, StartReport, WorkerGroup};
use crate::worker::WorkerSpec;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type GroupFactory = Box<dyn Fn() -> GroupResult<Box<dyn WorkerGroup>> + Send>;

struct Stage {
    name: String,
    edges: StageEdges,
    factory: GroupFactory,
}

/// Pipeline of worker stages sharing one execution controller
pub struct Pipeline {
    controller: ExecutionController,
    logger: Logger,
    policy: ShortfallPolicy,
    monitor_interval: Duration,
    channels: Vec<Arc<dyn DrainTarget>>,
    stages: Vec<Stage>,
    /// Started groups, in start order
    running: Vec<Box<dyn WorkerGroup>>,
    run_id: Option<String>,
}

impl Pipeline {
    pub fn new(controller: ExecutionController, logger: Logger) -> Self {
        Self {
            controller,
            logger,
            policy: ShortfallPolicy::default(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            channels: Vec::new(),
            stages: Vec::new(),
            running: Vec::new(),
            run_id: None,
        }
    }

    pub fn with_shortfall_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn controller(&self) -> &ExecutionController {
        &self.controller
    }

    /// Register a stage; stages start in registration order
    ///
    /// Every channel the worker spec reads or writes is registered as well.
    pub fn add_stage<A, I, O>(&mut self, spec: WorkerSpec<A, I, O>) -> PipelineResult<()>
    where
        A: Clone + Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
    {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        if !spec.controller().same_as(&self.controller) {
            return Err(PipelineError::ControllerMismatch(spec.name().to_string()));
        }
        if self.stages.iter().any(|s| s.name == spec.name()) {
            return Err(PipelineError::DuplicateStage(spec.name().to_string()));
        }

        for channel in spec.inputs() {
            self.register(channel);
        }
        for channel in spec.outputs() {
            self.register(channel);
        }

        let edges = StageEdges {
            inputs: spec.input_ids(),
            outputs: spec.output_ids(),
        };
        let name = spec.name().to_string();
        let factory: GroupFactory = Box::new(move || {
            ProcessGroup::create(&spec).map(|group| Box::new(group) as Box<dyn WorkerGroup>)
        });

        self.logger.debug(format_args!(
            "Registered stage '{}' ({} in, {} out)",
            name,
            edges.inputs.len(),
            edges.outputs.len()
        ));
        self.stages.push(Stage {
            name,
            edges,
            factory,
        });
        Ok(())
    }

    /// Register a channel only the orchestrator reads, so it is drained too
    pub fn add_channel<M>(&mut self, channel: &Channel<M>)
    where
        M: Send + 'static,
    {
        self.register(channel);
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.id()).collect()
    }

    /// Shutdown drain order, consumer end first
    pub fn drain_order(&self) -> Vec<ChannelId> {
        let edges: Vec<StageEdges> = self.stages.iter().map(|s| s.edges.clone()).collect();
        drain_order(&self.channel_ids(), &edges)
    }

    pub fn channel_stats(&self) -> Vec<ChannelStats> {
        self.channels.iter().map(|c| c.stats()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.run_id.is_some()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Start every stage in registration order
    ///
    /// On failure nothing is left running.
    pub fn start(&mut self) -> PipelineResult<Vec<StartReport>> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let run_id = generate_run_id();
        self.logger.info(format_args!(
            "Starting pipeline run {} ({} stages, {} channels)",
            run_id,
            self.stages.len(),
            self.channels.len()
        ));
        self.run_id = Some(run_id);

        let mut reports = Vec::with_capacity(self.stages.len());
        for index in 0..self.stages.len() {
            match self.start_stage(index) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    self.logger
                        .error(format_args!("Pipeline startup failed: {}", e));
                    let rollback = self.stop();
                    self.logger.warn(format_args!(
                        "Rolled back {} started stage(s)",
                        rollback.joins.len()
                    ));
                    return Err(e);
                }
            }
        }

        self.logger.info("Pipeline started");
        Ok(reports)
    }

    /// Orchestrator loop
    ///
    /// Calls `monitor` every monitor interval until `duration` elapses, the
    /// monitor returns `Stop`, or exit is requested elsewhere. Does not shut
    /// the pipeline down.
    pub fn run<F>(&mut self, duration: Duration, mut monitor: F) -> PipelineResult<RunOutcome>
    where
        F: FnMut() -> MonitorControl,
    {
        if !self.is_running() {
            return Err(PipelineError::NotRunning);
        }

        let start = Instant::now();
        let outcome = loop {
            if self.controller.is_exit_requested() {
                break RunOutcome::ExitRequested;
            }
            if start.elapsed() >= duration {
                break RunOutcome::Elapsed;
            }
            if monitor() == MonitorControl::Stop {
                break RunOutcome::Stopped;
            }
            thread::sleep(self.monitor_interval);
        };

        self.logger.info(format_args!(
            "Run loop finished after {}ms: {:?}",
            start.elapsed().as_millis(),
            outcome
        ));
        Ok(outcome)
    }

    /// Ordered shutdown; leaves the controller and channels ready for reuse
    pub fn shutdown(&mut self) -> PipelineResult<ShutdownReport> {
        if !self.is_running() {
            return Err(PipelineError::NotRunning);
        }
        Ok(self.stop())
    }

    fn start_stage(&mut self, index: usize) -> PipelineResult<StartReport> {
        let stage = &self.stages[index];
        let mut group = (stage.factory)()?;
        let report = group.start()?;
        self.running.push(group);

        if report.spawned == 0
            || (report.shortfall() > 0 && self.policy == ShortfallPolicy::Abort)
        {
            return Err(PipelineError::StartFailed {
                stage: report.group,
                requested: report.requested,
                spawned: report.spawned,
            });
        }
        Ok(report)
    }

    fn stop(&mut self) -> ShutdownReport {
        let start = Instant::now();
        let run_id = self.run_id.take().unwrap_or_default();

        self.controller.request_exit();
        self.logger.info("Requested exit");

        let mut drains = Vec::with_capacity(self.channels.len());
        for id in self.drain_order() {
            if let Some(channel) = self.channels.iter().find(|c| c.id() == id) {
                drains.push(channel.drain());
            }
        }
        self.logger.info(format_args!(
            "Drained {} channel(s), {} message(s) discarded",
            drains.len(),
            drains.iter().map(|d| d.discarded).sum::<usize>()
        ));

        let mut joins = Vec::with_capacity(self.running.len());
        let mut join_errors = Vec::new();
        while let Some(mut group) = self.running.pop() {
            match group.join() {
                Ok(report) => joins.push(report),
                Err(e) => {
                    self.logger
                        .error(format_args!("Failed to join '{}': {}", group.name(), e));
                    join_errors.push(e);
                }
            }
        }
        self.logger.info("Stopped");

        self.controller.clear_exit();
        for channel in &self.channels {
            channel.reopen();
        }

        ShutdownReport {
            run_id,
            drains,
            joins,
            join_errors,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn register<M>(&mut self, channel: &Channel<M>)
    where
        M: Send + 'static,
    {
        if self.channels.iter().all(|c| c.id() != channel.id()) {
            self.channels.push(Arc::new(channel.clone()));
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.is_running() {
            self.logger
                .warn("Pipeline dropped while running, shutting down");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::GroupError;
    use crate::worker::WorkerContext;
    use pretty_assertions::assert_eq;

    fn deps() -> (ExecutionController, Logger) {
        (
            ExecutionController::new(),
            Logger::create("orchestrator").unwrap(),
        )
    }

    fn idle(ctx: WorkerContext<(), u32, u32>) -> anyhow::Result<()> {
        while ctx.poll() {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    #[test]
    fn test_start_requires_stages() {
        let (controller, logger) = deps();
        let mut pipeline = Pipeline::new(controller, logger);
        assert_eq!(pipeline.start().unwrap_err(), PipelineError::NoStages);
        assert_eq!(pipeline.shutdown().unwrap_err(), PipelineError::NotRunning);
    }

    #[test]
    fn test_add_stage_rejects_foreign_controller() {
        let (controller, logger) = deps();
        let other = ExecutionController::new();
        let spec: WorkerSpec<(), u32, u32> =
            WorkerSpec::create("idle", 1, idle, (), vec![], vec![], &other, &logger).unwrap();

        let mut pipeline = Pipeline::new(controller, logger);
        assert_eq!(
            pipeline.add_stage(spec).unwrap_err(),
            PipelineError::ControllerMismatch("idle".to_string())
        );
    }

    #[test]
    fn test_add_stage_rejects_duplicate_names() {
        let (controller, logger) = deps();
        let spec: WorkerSpec<(), u32, u32> =
            WorkerSpec::create("idle", 1, idle, (), vec![], vec![], &controller, &logger).unwrap();

        let mut pipeline = Pipeline::new(controller, logger);
        pipeline.add_stage(spec.clone()).unwrap();
        assert!(matches!(
            pipeline.add_stage(spec),
            Err(PipelineError::DuplicateStage(_))
        ));
    }

    #[test]
    fn test_channels_registered_once() {
        let (controller, logger) = deps();
        let a: Channel<u32> = Channel::bounded("a", 1);
        let b: Channel<u32> = Channel::bounded("b", 1);

        let first = WorkerSpec::create(
            "first",
            1,
            idle,
            (),
            vec![],
            vec![a.clone()],
            &controller,
            &logger,
        )
        .unwrap();
        let second = WorkerSpec::create(
            "second",
            1,
            idle,
            (),
            vec![a.clone()],
            vec![b.clone()],
            &controller,
            &logger,
        )
        .unwrap();

        let mut pipeline = Pipeline::new(controller, logger);
        pipeline.add_stage(first).unwrap();
        pipeline.add_stage(second).unwrap();
        pipeline.add_channel(&b);

        assert_eq!(pipeline.channel_ids(), vec![a.id(), b.id()]);
        assert_eq!(pipeline.drain_order(), vec![b.id(), a.id()]);
        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_start_run_shutdown() {
        let (controller, logger) = deps();
        let spec: WorkerSpec<(), u32, u32> =
            WorkerSpec::create("idle", 2, idle, (), vec![], vec![], &controller, &logger).unwrap();

        let mut pipeline = Pipeline::new(controller.clone(), logger)
            .with_monitor_interval(Duration::from_millis(1));
        pipeline.add_stage(spec).unwrap();

        let reports = pipeline.start().unwrap();
        assert_eq!(reports[0].spawned, 2);
        assert!(pipeline.is_running());
        assert!(matches!(pipeline.start(), Err(PipelineError::AlreadyRunning)));

        let mut ticks = 0;
        let outcome = pipeline
            .run(Duration::from_secs(5), || {
                ticks += 1;
                if ticks == 3 {
                    MonitorControl::Stop
                } else {
                    MonitorControl::Continue
                }
            })
            .unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);

        let report = pipeline.shutdown().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.joins[0].completed(), 2);
        assert!(!pipeline.is_running());
        assert!(!controller.is_exit_requested());
        assert_eq!(controller.snapshot().generation, 1);
    }

    #[test]
    fn test_run_returns_on_external_exit() {
        let (controller, logger) = deps();
        let spec: WorkerSpec<(), u32, u32> =
            WorkerSpec::create("idle", 1, idle, (), vec![], vec![], &controller, &logger).unwrap();
        let mut pipeline = Pipeline::new(controller.clone(), logger);
        pipeline.add_stage(spec).unwrap();
        pipeline.start().unwrap();

        controller.request_exit();
        let outcome = pipeline.run(Duration::from_secs(5), || MonitorControl::Continue);
        assert_eq!(outcome.unwrap(), RunOutcome::ExitRequested);

        pipeline.shutdown().unwrap();
    }

    #[test]
    fn test_failed_start_rolls_back() {
        let (controller, logger) = deps();
        let started = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let healthy: WorkerSpec<(), u32, u32> = WorkerSpec::create(
            "healthy",
            1,
            move |ctx: WorkerContext<(), u32, u32>| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                idle(ctx)
            },
            (),
            vec![],
            vec![],
            &controller,
            &logger,
        )
        .unwrap();

        let mut pipeline = Pipeline::new(controller.clone(), logger);
        pipeline.add_stage(healthy).unwrap();
        pipeline.stages.push(Stage {
            name: "broken".to_string(),
            edges: StageEdges::default(),
            factory: Box::new(|| -> GroupResult<Box<dyn WorkerGroup>> {
                Err(GroupError::ResourceExhausted {
                    group: "broken".to_string(),
                    requested: 1,
                    reason: "allocation refused".to_string(),
                })
            }),
        });

        let err = pipeline.start().unwrap_err();
        assert!(matches!(err, PipelineError::Group(GroupError::ResourceExhausted { .. })));
        assert!(!pipeline.is_running());
        assert!(pipeline.running.is_empty());
        assert!(!controller.is_exit_requested());
        assert_eq!(started.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
