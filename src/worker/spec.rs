/*!
 * Worker Spec
 *
 * Immutable, validated description of one pipeline stage: entry function,
 * fixed arguments, ordered input/output channels, and replica count.
 * Building a spec never spawns anything.
 */

use super::types::{SpecError, SpecResult, WorkerContext, WorkerFn};
use crate::channel::Channel;
use crate::control::ExecutionController;
use crate::core::types::{ChannelId, ReplicaId};
use crate::logging::Logger;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

struct SpecInner<A, I, O> {
    name: String,
    replicas: NonZeroUsize,
    entry: WorkerFn<A, I, O>,
    args: A,
    inputs: Vec<Channel<I>>,
    outputs: Vec<Channel<O>>,
    controller: ExecutionController,
    logger: Logger,
}

/// Validated stage description
///
/// Cloning shares the same description, so a pipeline can build a fresh
/// process group from it for every run.
pub struct WorkerSpec<A, I, O> {
    inner: Arc<SpecInner<A, I, O>>,
}

impl<A, I, O> WorkerSpec<A, I, O>
where
    A: Clone + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    /// Fallible factory
    ///
    /// Fails when `replicas` is zero or the name is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn create<F>(
        name: impl Into<String>,
        replicas: usize,
        entry: F,
        args: A,
        inputs: Vec<Channel<I>>,
        outputs: Vec<Channel<O>>,
        controller: &ExecutionController,
        logger: &Logger,
    ) -> SpecResult<Self>
    where
        F: Fn(WorkerContext<A, I, O>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::builder(name)
            .replicas(replicas)
            .entry(entry)
            .args(args)
            .inputs(inputs)
            .outputs(outputs)
            .controller(controller.clone())
            .logger(logger.clone())
            .build()
    }

    pub fn builder(name: impl Into<String>) -> WorkerSpecBuilder<A, I, O> {
        WorkerSpecBuilder::new(name)
    }

    pub fn replicas(&self) -> usize {
        self.inner.replicas.get()
    }

    pub fn args(&self) -> &A {
        &self.inner.args
    }

    pub fn inputs(&self) -> &[Channel<I>] {
        &self.inner.inputs
    }

    pub fn outputs(&self) -> &[Channel<O>] {
        &self.inner.outputs
    }

    pub fn controller(&self) -> &ExecutionController {
        &self.inner.controller
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn input_ids(&self) -> Vec<ChannelId> {
        self.inner.inputs.iter().map(Channel::id).collect()
    }

    pub fn output_ids(&self) -> Vec<ChannelId> {
        self.inner.outputs.iter().map(Channel::id).collect()
    }

    pub(crate) fn entry(&self) -> WorkerFn<A, I, O> {
        Arc::clone(&self.inner.entry)
    }

    /// Context for one replica; fixed args and channel handles are cloned
    pub(crate) fn context(&self, replica: ReplicaId) -> WorkerContext<A, I, O> {
        WorkerContext {
            args: self.inner.args.clone(),
            inputs: self.inner.inputs.clone(),
            outputs: self.inner.outputs.clone(),
            controller: self.inner.controller.clone(),
            logger: self.inner.logger.for_replica(replica),
            replica,
        }
    }
}

impl<A, I, O> WorkerSpec<A, I, O> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<A, I, O> Clone for WorkerSpec<A, I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, I, O> fmt::Debug for WorkerSpec<A, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.inner.name)
            .field("replicas", &self.inner.replicas)
            .field("inputs", &self.inner.inputs)
            .field("outputs", &self.inner.outputs)
            .finish()
    }
}

/// Builder for WorkerSpec
///
/// `controller`, `logger`, `entry` and `args` are required.
pub struct WorkerSpecBuilder<A, I, O> {
    name: String,
    replicas: usize,
    entry: Option<WorkerFn<A, I, O>>,
    args: Option<A>,
    inputs: Vec<Channel<I>>,
    outputs: Vec<Channel<O>>,
    controller: Option<ExecutionController>,
    logger: Option<Logger>,
}

impl<A, I, O> WorkerSpecBuilder<A, I, O>
where
    A: Clone + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replicas: 1,
            entry: None,
            args: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            controller: None,
            logger: None,
        }
    }

    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn entry<F>(mut self, entry: F) -> Self
    where
        F: Fn(WorkerContext<A, I, O>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entry = Some(Arc::new(entry));
        self
    }

    pub fn args(mut self, args: A) -> Self {
        self.args = Some(args);
        self
    }

    pub fn input(mut self, channel: Channel<I>) -> Self {
        self.inputs.push(channel);
        self
    }

    pub fn inputs(mut self, channels: Vec<Channel<I>>) -> Self {
        self.inputs = channels;
        self
    }

    pub fn output(mut self, channel: Channel<O>) -> Self {
        self.outputs.push(channel);
        self
    }

    pub fn outputs(mut self, channels: Vec<Channel<O>>) -> Self {
        self.outputs = channels;
        self
    }

    pub fn controller(mut self, controller: ExecutionController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> SpecResult<WorkerSpec<A, I, O>> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(SpecError::InvalidName(self.name));
        }
        let replicas =
            NonZeroUsize::new(self.replicas).ok_or(SpecError::InvalidReplicaCount(self.replicas))?;
        let controller = self.controller.ok_or_else(|| missing("controller"))?;
        let logger = self.logger.ok_or_else(|| missing("logger"))?;
        let entry = self.entry.ok_or_else(|| missing("entry"))?;
        let args = self.args.ok_or_else(|| missing("args"))?;

        Ok(WorkerSpec {
            inner: Arc::new(SpecInner {
                name: self.name,
                replicas,
                entry,
                args,
                inputs: self.inputs,
                outputs: self.outputs,
                controller,
                logger,
            }),
        })
    }
}

fn missing(dependency: &str) -> SpecError {
    SpecError::MissingDependency(dependency.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: WorkerContext<(), u32, u32>) -> anyhow::Result<()> {
        Ok(())
    }

    fn deps() -> (ExecutionController, Logger) {
        (ExecutionController::new(), Logger::create("spec-test").unwrap())
    }

    #[test]
    fn test_create_rejects_zero_replicas() {
        let (controller, logger) = deps();
        let result: SpecResult<WorkerSpec<(), u32, u32>> =
            WorkerSpec::create("stage", 0, noop, (), vec![], vec![], &controller, &logger);
        assert_eq!(result.unwrap_err(), SpecError::InvalidReplicaCount(0));
    }

    #[test]
    fn test_create_records_channels_in_order() {
        let (controller, logger) = deps();
        let a: Channel<u32> = Channel::bounded("a", 1);
        let b: Channel<u32> = Channel::bounded("b", 1);
        let c: Channel<u32> = Channel::bounded("c", 1);

        let spec = WorkerSpec::create(
            "stage",
            3,
            noop,
            (),
            vec![a.clone(), b.clone()],
            vec![c.clone()],
            &controller,
            &logger,
        )
        .unwrap();

        assert_eq!(spec.replicas(), 3);
        assert_eq!(spec.input_ids(), vec![a.id(), b.id()]);
        assert_eq!(spec.output_ids(), vec![c.id()]);
        assert!(spec.controller().same_as(&controller));
    }

    #[test]
    fn test_builder_requires_controller_and_logger() {
        let logger = Logger::create("builder").unwrap();
        let result = WorkerSpec::<(), u32, u32>::builder("stage")
            .entry(noop)
            .args(())
            .logger(logger)
            .build();
        assert_eq!(
            result.unwrap_err(),
            SpecError::MissingDependency("controller".to_string())
        );

        let result = WorkerSpec::<(), u32, u32>::builder("stage")
            .entry(noop)
            .args(())
            .controller(ExecutionController::new())
            .build();
        assert_eq!(
            result.unwrap_err(),
            SpecError::MissingDependency("logger".to_string())
        );
    }

    #[test]
    fn test_builder_rejects_bad_name() {
        let (controller, logger) = deps();
        let result = WorkerSpec::<(), u32, u32>::builder("two words")
            .entry(noop)
            .args(())
            .controller(controller)
            .logger(logger)
            .build();
        assert!(matches!(result, Err(SpecError::InvalidName(_))));
    }

    #[test]
    fn test_context_per_replica() {
        let (controller, logger) = deps();
        let spec: WorkerSpec<(), u32, u32> =
            WorkerSpec::create("ctx", 2, noop, (), vec![], vec![], &controller, &logger).unwrap();

        let ctx = spec.context(1);
        assert_eq!(ctx.replica, 1);
        assert_eq!(ctx.logger.name(), "spec-test_1");
        assert!(ctx.poll());

        controller.request_exit();
        assert!(!ctx.poll());
    }
}
