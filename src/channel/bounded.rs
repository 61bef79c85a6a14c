/*!
 * Bounded Channel
 *
 * Capacity-bounded FIFO shared by cloning the handle. Producers and
 * consumers get both non-blocking (`try_*`) and blocking access.
 *
 * # Drain protocol
 *
 * `drain()` marks the channel as draining, wakes every blocked producer and
 * consumer, and removes the resident messages in FIFO order. A producer that
 * wakes up to a draining channel gets its message back as
 * `SendError::Draining`. A consumer that finds the channel empty and draining
 * gets `RecvError::Draining`. The drain returns once nobody is blocked on the
 * channel and the queue is empty.
 *
 * The channel stays closed for sends until `reopen()`, so a worker that has
 * not yet observed the exit flag cannot block on it again.
 */

use super::types::{
    Capacity, ChannelStats, DrainReport, RecvError, SendError, TryRecvError, TrySendError,
};
use crate::core::limits::{DRAIN_POLL_INTERVAL, DRAIN_SETTLE_TIMEOUT};
use crate::core::types::{next_channel_id, ChannelId, Size};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct QueueState<M> {
    messages: VecDeque<M>,
    draining: bool,
    waiting_producers: Size,
    waiting_consumers: Size,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    discarded: AtomicU64,
}

struct Shared<M> {
    id: ChannelId,
    name: String,
    capacity: Capacity,
    state: Mutex<QueueState<M>>,
    not_full: Condvar,
    not_empty: Condvar,
    /// Signalled when a blocked worker leaves, so a drain can settle
    left: Condvar,
    counters: Counters,
}

/// Bounded FIFO channel
pub struct Channel<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Channel<M> {
    /// Create a channel; `Capacity::Bounded(0)` is treated as unbounded
    pub fn new(name: impl Into<String>, capacity: Capacity) -> Self {
        let capacity = capacity.normalized();
        let name = name.into();
        let id = next_channel_id();
        debug!(channel = %name, id, %capacity, "Channel created");

        let messages = match capacity {
            Capacity::Bounded(n) => VecDeque::with_capacity(n.min(1024)),
            Capacity::Unbounded => VecDeque::new(),
        };

        Self {
            shared: Arc::new(Shared {
                id,
                name,
                capacity,
                state: Mutex::new(QueueState {
                    messages,
                    draining: false,
                    waiting_producers: 0,
                    waiting_consumers: 0,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                left: Condvar::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Bounded channel; `capacity == 0` means unbounded
    pub fn bounded(name: impl Into<String>, capacity: Size) -> Self {
        Self::new(name, Capacity::bounded(capacity))
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, Capacity::Unbounded)
    }

    #[inline]
    pub fn id(&self) -> ChannelId {
        self.shared.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[inline]
    pub fn capacity(&self) -> Capacity {
        self.shared.capacity
    }

    pub fn len(&self) -> Size {
        self.shared.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().messages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let state = self.shared.state.lock();
        !self.shared.capacity.has_room(state.messages.len())
    }

    pub fn is_draining(&self) -> bool {
        self.shared.state.lock().draining
    }

    /// Enqueue without blocking
    ///
    /// On failure the channel is left unchanged and the message is returned.
    pub fn try_enqueue(&self, message: M) -> Result<(), TrySendError<M>> {
        let mut state = self.shared.state.lock();

        if state.draining {
            return Err(TrySendError::Draining(message));
        }
        if !self.shared.capacity.has_room(state.messages.len()) {
            return Err(TrySendError::Full(message));
        }

        self.push(&mut state, message);
        Ok(())
    }

    /// Enqueue, blocking until a slot frees up or the channel is drained
    pub fn enqueue(&self, message: M) -> Result<(), SendError<M>> {
        self.send_until(message, None)
    }

    /// Enqueue, blocking for at most `timeout`
    pub fn enqueue_timeout(&self, message: M, timeout: Duration) -> Result<(), SendError<M>> {
        self.send_until(message, Some(Instant::now() + timeout))
    }

    /// Dequeue without blocking
    pub fn try_dequeue(&self) -> Result<M, TryRecvError> {
        let mut state = self.shared.state.lock();

        match self.pop(&mut state) {
            Some(message) => Ok(message),
            None if state.draining => Err(TryRecvError::Draining),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Dequeue, blocking up to `timeout` (`None` waits indefinitely)
    ///
    /// Messages still resident while the channel drains are delivered.
    pub fn dequeue(&self, timeout: Option<Duration>) -> Result<M, RecvError> {
        let start = Instant::now();
        let deadline = timeout.map(|t| start + t);
        let mut state = self.shared.state.lock();

        loop {
            if let Some(message) = self.pop(&mut state) {
                return Ok(message);
            }
            if state.draining {
                return Err(RecvError::Draining);
            }

            state.waiting_consumers += 1;
            let timed_out = match deadline {
                Some(deadline) => self
                    .shared
                    .not_empty
                    .wait_until(&mut state, deadline)
                    .timed_out(),
                None => {
                    self.shared.not_empty.wait(&mut state);
                    false
                }
            };
            state.waiting_consumers -= 1;
            if state.draining {
                self.shared.left.notify_all();
            }

            if timed_out && state.messages.is_empty() {
                if state.draining {
                    return Err(RecvError::Draining);
                }
                return Err(RecvError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
    }

    /// Drain for shutdown, discarding resident messages
    pub fn drain(&self) -> DrainReport {
        self.drain_with(|_| {})
    }

    /// Drain for shutdown, handing each resident message to `sink` in FIFO order
    ///
    /// `sink` runs without the channel lock held.
    pub fn drain_with<F>(&self, mut sink: F) -> DrainReport
    where
        F: FnMut(M),
    {
        let start = Instant::now();
        let deadline = start + DRAIN_SETTLE_TIMEOUT;
        let mut discarded = 0;

        let mut state = self.shared.state.lock();
        state.draining = true;
        let released_producers = state.waiting_producers;
        let released_consumers = state.waiting_consumers;

        let settled = loop {
            self.shared.not_full.notify_all();
            self.shared.not_empty.notify_all();

            if !state.messages.is_empty() {
                let batch = std::mem::take(&mut state.messages);
                discarded += batch.len();
                self.shared
                    .counters
                    .discarded
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                MutexGuard::unlocked(&mut state, || batch.into_iter().for_each(&mut sink));
                continue;
            }

            if state.waiting_producers == 0 && state.waiting_consumers == 0 {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }

            self.shared.left.wait_for(&mut state, DRAIN_POLL_INTERVAL);
        };

        let report = DrainReport {
            id: self.shared.id,
            name: self.shared.name.clone(),
            discarded,
            released_producers,
            released_consumers,
            settled,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if settled {
            debug!(
                channel = %report.name,
                discarded,
                released_producers,
                released_consumers,
                "Channel drained"
            );
        } else {
            warn!(
                channel = %report.name,
                waiting_producers = state.waiting_producers,
                waiting_consumers = state.waiting_consumers,
                "Drain did not settle before deadline"
            );
        }

        report
    }

    /// Accept sends again after a completed shutdown
    pub fn reopen(&self) {
        let mut state = self.shared.state.lock();
        if state.draining {
            state.draining = false;
            debug!(channel = %self.shared.name, "Channel reopened");
        }
    }

    pub fn stats(&self) -> ChannelStats {
        let state = self.shared.state.lock();
        let counters = &self.shared.counters;

        ChannelStats {
            id: self.shared.id,
            name: self.shared.name.clone(),
            capacity: self.shared.capacity,
            length: state.messages.len(),
            draining: state.draining,
            waiting_producers: state.waiting_producers,
            waiting_consumers: state.waiting_consumers,
            enqueued_total: counters.enqueued.load(Ordering::Relaxed),
            dequeued_total: counters.dequeued.load(Ordering::Relaxed),
            discarded_total: counters.discarded.load(Ordering::Relaxed),
        }
    }

    fn send_until(&self, message: M, deadline: Option<Instant>) -> Result<(), SendError<M>> {
        let mut state = self.shared.state.lock();

        loop {
            if state.draining {
                return Err(SendError::Draining(message));
            }
            if self.shared.capacity.has_room(state.messages.len()) {
                self.push(&mut state, message);
                return Ok(());
            }

            state.waiting_producers += 1;
            let timed_out = match deadline {
                Some(deadline) => self
                    .shared
                    .not_full
                    .wait_until(&mut state, deadline)
                    .timed_out(),
                None => {
                    self.shared.not_full.wait(&mut state);
                    false
                }
            };
            state.waiting_producers -= 1;
            if state.draining {
                self.shared.left.notify_all();
                return Err(SendError::Draining(message));
            }

            if timed_out && !self.shared.capacity.has_room(state.messages.len()) {
                return Err(SendError::Timeout(message));
            }
        }
    }

    fn push(&self, state: &mut QueueState<M>, message: M) {
        state.messages.push_back(message);
        self.shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.not_empty.notify_one();
    }

    fn pop(&self, state: &mut QueueState<M>) -> Option<M> {
        let message = state.messages.pop_front()?;
        self.shared.counters.dequeued.fetch_add(1, Ordering::Relaxed);
        self.shared.not_full.notify_one();
        Some(message)
    }
}

impl<M> Clone for Channel<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M> fmt::Debug for Channel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}
