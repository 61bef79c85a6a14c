/*!
 * Channel Module
 * Bounded FIFO channels shared between workers, with a shutdown drain protocol
 */

mod bounded;
mod drain;
mod types;

pub use bounded::Channel;
pub use drain::DrainTarget;
pub use types::{
    Capacity, ChannelStats, DrainReport, RecvError, SendError, TryRecvError, TrySendError,
};
