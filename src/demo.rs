/*!
 * Demo Stages
 *
 * Placeholder bodies for the four flight stages (heartbeat sender, heartbeat
 * receiver, telemetry, command) talking to a simulated vehicle link. They
 * exist to exercise the pipeline; none of them carries flight semantics.
 *
 * Every blocking call uses a bounded timeout so each loop returns to
 * `ctx.poll()` regularly.
 */

use flight_pipeline::channel::{RecvError, SendError};
use flight_pipeline::WorkerContext;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Period between heartbeats on the simulated link
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

/// Consecutive missed heartbeats before the receiver reports a disconnect
pub const DISCONNECT_THRESHOLD: u32 = 5;

/// Upper bound on every blocking call inside a stage body
const STEP_TIMEOUT: Duration = Duration::from_millis(200);

// =============================================================================
// SIMULATED LINK
// =============================================================================

struct LinkState {
    address: String,
    opened: Instant,
    heartbeats_sent: AtomicU64,
    last_heartbeat: Mutex<Option<Instant>>,
    commands_sent: AtomicU64,
}

/// In-process stand-in for the vehicle connection
///
/// Clones share one link. The link "echoes" heartbeats: the receiver sees one
/// for every heartbeat the sender pushed within the last period.
#[derive(Clone)]
pub struct SimulatedLink {
    inner: Arc<LinkState>,
}

impl SimulatedLink {
    pub fn open(address: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(LinkState {
                address: address.into(),
                opened: Instant::now(),
                heartbeats_sent: AtomicU64::new(0),
                last_heartbeat: Mutex::new(None),
                commands_sent: AtomicU64::new(0),
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn send_heartbeat(&self) {
        self.inner.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_heartbeat.lock() = Some(Instant::now());
    }

    /// Wait up to `timeout` for a heartbeat from the vehicle
    pub fn recv_heartbeat(&self, timeout: Duration) -> bool {
        thread::sleep(timeout);
        let last = *self.inner.last_heartbeat.lock();
        last.is_some_and(|at| at.elapsed() <= HEARTBEAT_PERIOD * 2)
    }

    /// Wait up to `timeout` for the next telemetry sample
    pub fn recv_telemetry(&self, timeout: Duration) -> Option<Telemetry> {
        thread::sleep(timeout);
        let t = self.inner.opened.elapsed().as_secs_f32();
        Some(Telemetry {
            time_since_boot_ms: self.inner.opened.elapsed().as_millis() as u64,
            x: t.cos(),
            y: t.sin(),
            z: 1.0,
        })
    }

    pub fn send_command(&self, _command: &str) {
        self.inner.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.inner.heartbeats_sent.load(Ordering::Relaxed)
    }

    pub fn commands_sent(&self) -> u64 {
        self.inner.commands_sent.load(Ordering::Relaxed)
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartbeatStatus {
    Connected,
    Disconnected,
}

impl fmt::Display for HeartbeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected"),
            Self::Disconnected => f.write_str("Disconnected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub time_since_boot_ms: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

// =============================================================================
// STAGE BODIES
// =============================================================================

pub fn heartbeat_sender(ctx: WorkerContext<SimulatedLink, (), ()>) -> anyhow::Result<()> {
    ctx.logger
        .info(format_args!("Sending heartbeats to {}", ctx.args.address()));
    while ctx.poll() {
        ctx.args.send_heartbeat();
        thread::sleep(HEARTBEAT_PERIOD);
    }
    Ok(())
}

pub fn heartbeat_receiver(
    ctx: WorkerContext<SimulatedLink, (), HeartbeatStatus>,
) -> anyhow::Result<()> {
    let output = ctx
        .output(0)
        .ok_or_else(|| anyhow::anyhow!("heartbeat receiver needs an output channel"))?;
    let mut connected = false;
    let mut missed = 0;

    while ctx.poll() {
        if ctx.args.recv_heartbeat(STEP_TIMEOUT) {
            if !connected {
                ctx.logger.info("Connected to vehicle");
            }
            connected = true;
            missed = 0;
        } else if connected {
            missed += 1;
            ctx.logger.warn(format_args!("{} heartbeats missed", missed));
            if missed >= DISCONNECT_THRESHOLD {
                connected = false;
                ctx.logger.warn("Disconnected from vehicle");
            }
        }

        let status = if connected {
            HeartbeatStatus::Connected
        } else {
            HeartbeatStatus::Disconnected
        };
        if !forward(output.enqueue_timeout(status, STEP_TIMEOUT)) {
            break;
        }
    }
    Ok(())
}

pub fn telemetry(ctx: WorkerContext<SimulatedLink, (), Telemetry>) -> anyhow::Result<()> {
    let output = ctx
        .output(0)
        .ok_or_else(|| anyhow::anyhow!("telemetry needs an output channel"))?;

    while ctx.poll() {
        let Some(sample) = ctx.args.recv_telemetry(STEP_TIMEOUT) else {
            ctx.logger.warn("Telemetry timed out");
            continue;
        };
        if !forward(output.enqueue_timeout(sample, STEP_TIMEOUT)) {
            break;
        }
    }
    Ok(())
}

pub fn command(ctx: WorkerContext<SimulatedLink, Telemetry, String>) -> anyhow::Result<()> {
    let input = ctx
        .input(0)
        .ok_or_else(|| anyhow::anyhow!("command needs an input channel"))?;
    let output = ctx
        .output(0)
        .ok_or_else(|| anyhow::anyhow!("command needs an output channel"))?;
    let mut received = 0u64;

    while ctx.poll() {
        let sample = match input.dequeue(Some(STEP_TIMEOUT)) {
            Ok(sample) => sample,
            Err(RecvError::Timeout { .. }) => continue,
            Err(RecvError::Draining) => break,
        };
        received += 1;

        let report = format!(
            "sample {} at t={}ms ({:.2}, {:.2}, {:.2})",
            received, sample.time_since_boot_ms, sample.x, sample.y, sample.z
        );
        ctx.args.send_command(&report);
        if !forward(output.enqueue_timeout(report, STEP_TIMEOUT)) {
            break;
        }
    }
    Ok(())
}

/// False once the channel is draining; a timed-out message is dropped
fn forward<M>(result: Result<(), SendError<M>>) -> bool {
    match result {
        Ok(()) | Err(SendError::Timeout(_)) => true,
        Err(SendError::Draining(_)) => false,
    }
}
