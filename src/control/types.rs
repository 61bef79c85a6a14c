/*!
 * Control Types
 */

use serde::{Deserialize, Serialize};

/// Point-in-time view of the controller flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControlSnapshot {
    pub exit_requested: bool,
    pub paused: bool,
    /// Number of completed runs (incremented by `clear_exit`)
    pub generation: u64,
}
