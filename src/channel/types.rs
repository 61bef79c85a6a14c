/*!
 * Channel Types
 * Capacity, statistics, drain reports, and send/receive errors
 */

use crate::core::types::{ChannelId, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Channel capacity
///
/// `Bounded(0)` never survives construction: `Channel::new` and
/// deserialisation both turn it into `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "CapacityRepr")]
pub enum Capacity {
    Bounded(Size),
    Unbounded,
}

/// Wire shape of `Capacity` before zero is normalised
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum CapacityRepr {
    Bounded(Size),
    Unbounded,
}

impl From<CapacityRepr> for Capacity {
    fn from(repr: CapacityRepr) -> Self {
        match repr {
            CapacityRepr::Bounded(n) => Self::bounded(n),
            CapacityRepr::Unbounded => Self::Unbounded,
        }
    }
}

impl Capacity {
    /// Interpret a configured limit, where `<= 0` means unbounded
    pub fn from_limit(limit: i64) -> Self {
        if limit <= 0 {
            Self::Unbounded
        } else {
            Self::Bounded(usize::try_from(limit).unwrap_or(usize::MAX))
        }
    }

    /// Bounded capacity; zero maps to unbounded like `from_limit`
    pub fn bounded(size: Size) -> Self {
        if size == 0 {
            Self::Unbounded
        } else {
            Self::Bounded(size)
        }
    }

    /// Same capacity with a zero bound mapped to unbounded
    #[inline]
    pub fn normalized(self) -> Self {
        match self {
            Self::Bounded(n) => Self::bounded(n),
            Self::Unbounded => Self::Unbounded,
        }
    }

    #[inline]
    pub fn limit(&self) -> Option<Size> {
        match self {
            Self::Bounded(n) => Some(*n),
            Self::Unbounded => None,
        }
    }

    #[inline]
    pub(crate) fn has_room(&self, len: Size) -> bool {
        match self {
            Self::Bounded(n) => len < *n,
            Self::Unbounded => true,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{}", n),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Channel statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub id: ChannelId,
    pub name: String,
    pub capacity: Capacity,
    pub length: Size,
    pub draining: bool,
    pub waiting_producers: Size,
    pub waiting_consumers: Size,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
    pub discarded_total: u64,
}

/// Outcome of a single `drain()` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub id: ChannelId,
    pub name: String,
    /// Resident messages removed by the drain, in FIFO order
    pub discarded: Size,
    /// Producers that were blocked in `enqueue` when the drain began
    pub released_producers: Size,
    /// Consumers that were blocked in `dequeue` when the drain began
    pub released_consumers: Size,
    /// False when blocked workers were still present at the settle deadline
    pub settled: bool,
    pub elapsed_ms: u64,
}

/// Non-blocking receive failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case")]
pub enum TryRecvError {
    #[error("Channel is empty")]
    #[diagnostic(
        code(channel::empty),
        help("Nothing to receive right now. Poll again or use a blocking dequeue.")
    )]
    Empty,

    #[error("Channel is empty and draining")]
    #[diagnostic(
        code(channel::draining),
        help("The channel was drained for shutdown. The worker should check for exit.")
    )]
    Draining,
}

/// Blocking receive failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case")]
pub enum RecvError {
    #[error("Receive timed out after {elapsed_ms}ms")]
    #[diagnostic(
        code(channel::timeout),
        help("No message arrived in time. Return to the poll loop and check for exit.")
    )]
    Timeout { elapsed_ms: u64 },

    #[error("Channel is empty and draining")]
    #[diagnostic(
        code(channel::draining),
        help("The channel was drained for shutdown. The worker should check for exit.")
    )]
    Draining,
}

/// Non-blocking send failure; the rejected message is handed back
#[derive(Error, Clone, PartialEq, Eq, Diagnostic)]
pub enum TrySendError<M> {
    /// At capacity, channel left unchanged
    #[error("Channel is full")]
    #[diagnostic(
        code(channel::full),
        help("A consumer is falling behind. Retry later or use a blocking enqueue.")
    )]
    Full(M),

    /// Closed for drain
    #[error("Channel is draining")]
    #[diagnostic(
        code(channel::draining),
        help("The channel was drained for shutdown. The worker should check for exit.")
    )]
    Draining(M),
}

impl<M> TrySendError<M> {
    pub fn into_inner(self) -> M {
        match self {
            Self::Full(m) | Self::Draining(m) => m,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl<M> fmt::Debug for TrySendError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Draining(_) => f.write_str("Draining(..)"),
        }
    }
}

/// Blocking send failure; the rejected message is handed back
#[derive(Error, Clone, PartialEq, Eq, Diagnostic)]
pub enum SendError<M> {
    /// The channel was drained while the producer waited (or before it called)
    #[error("Channel is draining")]
    #[diagnostic(
        code(channel::draining),
        help("The channel was drained for shutdown. The worker should check for exit.")
    )]
    Draining(M),

    /// No slot freed up before the deadline
    #[error("Send timed out waiting for a free slot")]
    #[diagnostic(
        code(channel::send_timeout),
        help("The channel stayed full. Return to the poll loop and check for exit.")
    )]
    Timeout(M),
}

impl<M> SendError<M> {
    pub fn into_inner(self) -> M {
        match self {
            Self::Draining(m) | Self::Timeout(m) => m,
        }
    }

    pub fn is_draining(&self) -> bool {
        matches!(self, Self::Draining(_))
    }
}

impl<M> fmt::Debug for SendError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draining(_) => f.write_str("Draining(..)"),
            Self::Timeout(_) => f.write_str("Timeout(..)"),
        }
    }
}
