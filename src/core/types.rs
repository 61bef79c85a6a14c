/*!
 * Core Types
 * Common identifiers used across the pipeline
 */

use std::sync::atomic::{AtomicU32, Ordering};

/// Channel identifier, unique within the running program
pub type ChannelId = u32;

/// Replica index within a process group (0-based)
pub type ReplicaId = usize;

/// Size type for queue lengths and capacities
pub type Size = usize;

static NEXT_CHANNEL_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a fresh channel identifier
///
/// Identifiers start at 1 and are never reused.
pub(crate) fn next_channel_id() -> ChannelId {
    NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_are_unique() {
        let a = next_channel_id();
        let b = next_channel_id();
        assert!(a > 0);
        assert_ne!(a, b);
    }
}
