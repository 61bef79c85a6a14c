/*!
 * Drain Target
 *
 * Object-safe view of a channel used by the orchestrator, which holds
 * channels of different message types in one shutdown list.
 */

use super::bounded::Channel;
use super::types::{ChannelStats, DrainReport};
use crate::core::types::ChannelId;

/// Channel operations needed during shutdown, independent of message type
pub trait DrainTarget: Send + Sync {
    fn id(&self) -> ChannelId;

    fn name(&self) -> &str;

    /// Unblock every waiting worker and empty the channel
    fn drain(&self) -> DrainReport;

    /// Accept sends again for the next run
    fn reopen(&self);

    fn stats(&self) -> ChannelStats;
}

impl<M> DrainTarget for Channel<M>
where
    M: Send + 'static,
{
    fn id(&self) -> ChannelId {
        Channel::id(self)
    }

    fn name(&self) -> &str {
        Channel::name(self)
    }

    fn drain(&self) -> DrainReport {
        Channel::drain(self)
    }

    fn reopen(&self) {
        Channel::reopen(self)
    }

    fn stats(&self) -> ChannelStats {
        Channel::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mixed_channels_behind_trait() {
        let numbers: Channel<u64> = Channel::bounded("numbers", 2);
        let words: Channel<String> = Channel::bounded("words", 2);
        numbers.try_enqueue(1).unwrap();
        words.try_enqueue("hello".to_string()).unwrap();

        let targets: Vec<Arc<dyn DrainTarget>> =
            vec![Arc::new(numbers.clone()), Arc::new(words.clone())];

        let discarded: usize = targets.iter().map(|t| t.drain().discarded).sum();
        assert_eq!(discarded, 2);
        assert!(numbers.is_draining());
        assert_eq!(targets[1].name(), "words");

        for target in &targets {
            target.reopen();
        }
        assert!(!words.is_draining());
    }
}
