/*!
 * Flight Pipeline - Main Entry Point
 *
 * Assembles the four-stage flight pipeline over a simulated vehicle link:
 * - heartbeat sender and receiver
 * - telemetry
 * - command (reads telemetry)
 *
 * The orchestrator reads the heartbeat and command queues itself and stops on
 * a disconnect, when the run duration elapses, or on Ctrl+C.
 *
 * Usage: pipeline [config.json]
 */

mod demo;

use demo::{HeartbeatStatus, SimulatedLink, Telemetry};
use flight_pipeline::{
    init_tracing, Channel, ExecutionController, Logger, MonitorControl, Pipeline, PipelineConfig,
    ShutdownReport, WorkerSpec,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match PipelineConfig::resolve(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("{:?}", miette::Report::new(e));
        return ExitCode::FAILURE;
    }

    let controller = ExecutionController::with_poll_interval(config.poll_interval());

    let signal_controller = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            signal_controller.request_exit();
        }
    });

    let result = tokio::task::spawn_blocking(move || run(config, controller)).await;
    match result {
        Ok(Ok(report)) => {
            info!(
                run_id = %report.run_id,
                discarded = report.discarded(),
                elapsed_ms = report.elapsed_ms,
                clean = report.is_clean(),
                "Pipeline finished"
            );
            println!("Success!");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = %e, "Pipeline failed");
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Pipeline task aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(config: PipelineConfig, controller: ExecutionController) -> miette::Result<ShutdownReport> {
    let logger = Logger::create("main")?;
    let link = SimulatedLink::open(config.connection.clone());
    info!(connection = %link.address(), "Opened vehicle link");

    let heartbeat_queue: Channel<HeartbeatStatus> =
        Channel::new("heartbeat", config.queues.heartbeat_capacity());
    let telemetry_queue: Channel<Telemetry> =
        Channel::new("telemetry", config.queues.telemetry_capacity());
    let command_queue: Channel<String> = Channel::new("command", config.queues.command_capacity());

    let heartbeat_sender = WorkerSpec::create(
        "heartbeat_sender",
        config.workers.heartbeat_sender,
        demo::heartbeat_sender,
        link.clone(),
        vec![],
        vec![],
        &controller,
        &Logger::create("heartbeat_sender")?,
    )?;
    let heartbeat_receiver = WorkerSpec::create(
        "heartbeat_receiver",
        config.workers.heartbeat_receiver,
        demo::heartbeat_receiver,
        link.clone(),
        vec![],
        vec![heartbeat_queue.clone()],
        &controller,
        &Logger::create("heartbeat_receiver")?,
    )?;
    let telemetry = WorkerSpec::create(
        "telemetry",
        config.workers.telemetry,
        demo::telemetry,
        link.clone(),
        vec![],
        vec![telemetry_queue.clone()],
        &controller,
        &Logger::create("telemetry")?,
    )?;
    let command = WorkerSpec::create(
        "command",
        config.workers.command,
        demo::command,
        link.clone(),
        vec![telemetry_queue.clone()],
        vec![command_queue.clone()],
        &controller,
        &Logger::create("command")?,
    )?;

    let mut pipeline = Pipeline::new(controller, logger.clone())
        .with_shortfall_policy(config.shortfall_policy)
        .with_monitor_interval(config.monitor_interval());
    pipeline.add_stage(heartbeat_sender)?;
    pipeline.add_stage(heartbeat_receiver)?;
    pipeline.add_stage(telemetry)?;
    pipeline.add_stage(command)?;

    pipeline.start()?;
    logger.info("Started");

    let mut seen_connected = false;
    let outcome = pipeline.run(config.run_duration(), || {
        if let Ok(status) = heartbeat_queue.try_dequeue() {
            logger.info(format_args!("Heartbeat status: {}", status));
            seen_connected |= status == HeartbeatStatus::Connected;
            if seen_connected && status == HeartbeatStatus::Disconnected {
                logger.warn("Vehicle disconnected");
                return MonitorControl::Stop;
            }
        }
        if let Ok(command) = command_queue.try_dequeue() {
            logger.info(format_args!("Command data: {}", command));
        }
        MonitorControl::Continue
    })?;
    info!(?outcome, "Leaving run loop");

    let report = pipeline.shutdown()?;
    for drain in &report.drains {
        if !drain.settled {
            warn!(channel = %drain.name, "Drain did not settle");
        }
    }
    info!(
        heartbeats = link.heartbeats_sent(),
        commands = link.commands_sent(),
        "Link totals"
    );
    Ok(report)
}
