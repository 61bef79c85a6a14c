/*!
 * Core Module
 * Shared identifiers and limits
 */

pub mod limits;
pub mod types;

pub use types::{ChannelId, ReplicaId, Size};
