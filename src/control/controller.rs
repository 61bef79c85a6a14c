/*!
 * Execution Controller
 *
 * Pair of shared boolean signals (`exit`, `pause`) observed by every worker
 * through explicit polling. Workers never get cancelled preemptively: they
 * call `is_exit_requested()` at the top of their loop and `check_pause()` as
 * their cooperative suspension point.
 *
 * # Visibility
 *
 * Both flags are SeqCst atomics and every poll re-reads them. A worker parked
 * in `check_pause()` sleeps on a condvar with a bounded interval, so it sees a
 * concurrent `request_exit()` even if a notification is missed.
 */

use super::types::ControlSnapshot;
use crate::core::limits::PAUSE_POLL_INTERVAL;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct ControlState {
    exit: AtomicBool,
    pause: AtomicBool,
    generation: AtomicU64,
    park: Mutex<()>,
    wake: Condvar,
    poll_interval: Duration,
}

/// Shared exit/pause signals
///
/// Cloning is cheap and every clone observes the same flags. Pass one clone to
/// each worker and to every orchestration call rather than keeping a global.
#[derive(Clone)]
pub struct ExecutionController {
    inner: Arc<ControlState>,
}

impl ExecutionController {
    pub fn new() -> Self {
        Self::with_poll_interval(PAUSE_POLL_INTERVAL)
    }

    /// Create a controller whose paused workers re-check the flags at least
    /// every `poll_interval`
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ControlState {
                exit: AtomicBool::new(false),
                pause: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                park: Mutex::new(()),
                wake: Condvar::new(),
                poll_interval: poll_interval.max(Duration::from_millis(1)),
            }),
        }
    }

    /// Ask every worker to stop. Idempotent.
    pub fn request_exit(&self) {
        if !self.inner.exit.swap(true, Ordering::SeqCst) {
            info!("Exit requested");
        }
        self.wake_parked();
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        self.inner.exit.load(Ordering::SeqCst)
    }

    /// Reset the exit flag so the controller can drive another run
    ///
    /// Precondition: every worker that observed the previous exit has already
    /// been joined. Violating it only affects ordering, the flags stay valid.
    pub fn clear_exit(&self) {
        if self.inner.exit.swap(false, Ordering::SeqCst) {
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            info!(generation, "Exit cleared, controller rearmed");
        }
    }

    pub fn pause(&self) {
        if !self.inner.pause.swap(true, Ordering::SeqCst) {
            debug!("Workers paused");
        }
    }

    pub fn resume(&self) {
        if self.inner.pause.swap(false, Ordering::SeqCst) {
            debug!("Workers resumed");
        }
        self.wake_parked();
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.inner.pause.load(Ordering::SeqCst)
    }

    /// Cooperative suspension point
    ///
    /// Returns immediately when not paused. Otherwise parks the caller until
    /// `resume()` or `request_exit()`, whichever comes first.
    pub fn check_pause(&self) {
        if !self.is_paused() {
            return;
        }

        let mut guard = self.inner.park.lock();
        while self.is_paused() && !self.is_exit_requested() {
            self.inner
                .wake
                .wait_for(&mut guard, self.inner.poll_interval);
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            exit_requested: self.is_exit_requested(),
            paused: self.is_paused(),
            generation: self.inner.generation.load(Ordering::SeqCst),
        }
    }

    /// Returns true when both handles refer to the same shared flags
    pub fn same_as(&self, other: &ExecutionController) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn wake_parked(&self) {
        // Taking the lock orders this wakeup after any waiter's flag check
        let _guard = self.inner.park.lock();
        self.inner.wake.notify_all();
    }
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionController")
            .field("exit", &self.is_exit_requested())
            .field("pause", &self.is_paused())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish()
    }
}
