/*!
 * Control Module
 * Broadcast exit and pause signals shared by every worker
 */

mod controller;
mod types;

pub use controller::ExecutionController;
pub use types::ControlSnapshot;
