/*!
 * Process Group Tests
 * Spec validation and replica group lifecycle through the public API
 */

use flight_pipeline::channel::RecvError;
use flight_pipeline::process::{GroupError, GroupState, ProcessGroup, ReplicaExit, WorkerGroup};
use flight_pipeline::worker::{SpecError, WorkerContext, WorkerSpec};
use flight_pipeline::{Channel, ExecutionController, Logger};
use pretty_assertions::assert_eq;
use std::time::Duration;

type Ctx = WorkerContext<u32, u32, u32>;

fn forward_scaled(ctx: Ctx) -> anyhow::Result<()> {
    let input = ctx.input(0).ok_or_else(|| anyhow::anyhow!("no input"))?;
    let output = ctx.output(0).ok_or_else(|| anyhow::anyhow!("no output"))?;
    while ctx.poll() {
        match input.dequeue(Some(Duration::from_millis(10))) {
            Ok(m) => {
                if output.enqueue(m * ctx.args).is_err() {
                    break;
                }
            }
            Err(RecvError::Draining) => break,
            Err(RecvError::Timeout { .. }) => continue,
        }
    }
    Ok(())
}

#[test]
fn test_zero_replicas_yields_no_spec_and_no_group() {
    let controller = ExecutionController::new();
    let logger = Logger::create("zero").unwrap();

    let result = WorkerSpec::create(
        "zero",
        0,
        forward_scaled,
        2,
        vec![],
        vec![],
        &controller,
        &logger,
    );

    // Without a spec there is nothing to build a ProcessGroup from
    assert_eq!(result.unwrap_err(), SpecError::InvalidReplicaCount(0));
}

#[test]
fn test_group_processes_messages_then_stops_on_exit() {
    let controller = ExecutionController::new();
    let logger = Logger::create("scale").unwrap();
    let input: Channel<u32> = Channel::bounded("in", 4);
    let output: Channel<u32> = Channel::unbounded("out");

    let spec = WorkerSpec::create(
        "scale",
        2,
        forward_scaled,
        10,
        vec![input.clone()],
        vec![output.clone()],
        &controller,
        &logger,
    )
    .unwrap();
    let mut group = ProcessGroup::create(&spec).unwrap();
    group.start().unwrap();

    for i in 1..=5 {
        input.enqueue(i).unwrap();
    }
    let mut results: Vec<u32> = (0..5)
        .map(|_| output.dequeue(Some(Duration::from_secs(5))).unwrap())
        .collect();
    results.sort_unstable();
    assert_eq!(results, vec![10, 20, 30, 40, 50]);

    controller.request_exit();
    input.drain();
    let report = group.join_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(report.completed(), 2);
    assert_eq!(report.shortfall(), 0);
    assert_eq!(WorkerGroup::state(&group), GroupState::Joined);
}

#[test]
fn test_failing_replica_counts_as_shortfall() {
    let controller = ExecutionController::new();
    let logger = Logger::create("fails").unwrap();

    let spec = WorkerSpec::create(
        "fails",
        3,
        |ctx: WorkerContext<(), (), ()>| {
            if ctx.replica == 2 {
                anyhow::bail!("link lost");
            }
            while ctx.poll() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        },
        (),
        vec![],
        vec![],
        &controller,
        &logger,
    )
    .unwrap();

    let mut group = ProcessGroup::create(&spec).unwrap();
    group.start().unwrap();
    controller.request_exit();
    let report = group.join().unwrap();

    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.shortfall(), 1);
    assert!(report
        .outcomes
        .contains(&(2, ReplicaExit::Failed("link lost".to_string()))));
}

#[test]
fn test_join_before_start_leaves_group_usable() {
    let controller = ExecutionController::new();
    let logger = Logger::create("early").unwrap();
    let spec: WorkerSpec<(), (), ()> = WorkerSpec::create(
        "early",
        1,
        |_ctx: WorkerContext<(), (), ()>| Ok(()),
        (),
        vec![],
        vec![],
        &controller,
        &logger,
    )
    .unwrap();

    let mut group = ProcessGroup::create(&spec).unwrap();
    assert!(matches!(group.join(), Err(GroupError::NotStarted(_))));

    group.start().unwrap();
    assert_eq!(group.join().unwrap().completed(), 1);
}

#[test]
fn test_fresh_group_per_run_from_one_spec() {
    let controller = ExecutionController::new();
    let logger = Logger::create("rerun").unwrap();
    let output: Channel<usize> = Channel::unbounded("runs");

    let spec = WorkerSpec::create(
        "rerun",
        2,
        |ctx: WorkerContext<(), (), usize>| {
            ctx.outputs[0]
                .enqueue(ctx.replica)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            while ctx.poll() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        },
        (),
        vec![],
        vec![output.clone()],
        &controller,
        &logger,
    )
    .unwrap();

    for _ in 0..2 {
        let mut group = ProcessGroup::create(&spec).unwrap();
        group.start().unwrap();
        controller.request_exit();
        assert_eq!(group.join().unwrap().completed(), 2);
        controller.clear_exit();
    }

    assert_eq!(output.len(), 4);
    assert_eq!(controller.snapshot().generation, 2);
}
