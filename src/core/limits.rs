/*!
 * Pipeline Limits and Constants
 *
 * Centralized location for timing constants and default sizes.
 * Grouped by the subsystem that consumes them.
 */

use std::time::Duration;

// =============================================================================
// CONTROLLER
// =============================================================================

/// Upper bound on how long a paused worker sleeps before re-reading the flags
/// Keeps `check_pause` responsive even if a wakeup is missed
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// CHANNELS
// =============================================================================

/// Default queue capacity for pipeline channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Interval between drain passes while waiting for blocked workers to leave
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Maximum time a single drain waits for blocked workers to return
/// A drain that exceeds this reports `settled = false` instead of hanging
pub const DRAIN_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Default interval between orchestrator monitor ticks
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Default pipeline run duration (seconds)
pub const DEFAULT_RUN_SECS: u64 = 100;

/// Interval used by `join_timeout` when polling replica completion
pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);
