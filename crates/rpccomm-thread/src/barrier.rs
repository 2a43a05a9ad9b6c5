use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// A countdown latch shared between threads.
///
/// Constructed with the number of signals expected; [`CountBarrier::wait`]
/// returns once that many [`CountBarrier::signal`] calls have been made.
/// Signals beyond the expected count are ignored.
#[derive(Debug)]
pub struct CountBarrier {
    remaining: Mutex<usize>,
    reached: Condvar,
}

impl CountBarrier {
    /// Create a barrier expecting `count` signals.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            reached: Condvar::new(),
        }
    }

    /// Record one signal, waking waiters when the count reaches zero.
    pub fn signal(&self) {
        let mut remaining = self.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        trace!(remaining = *remaining, "barrier signalled");
        if *remaining == 0 {
            self.reached.notify_all();
        }
    }

    /// Block until every expected signal has arrived.
    pub fn wait(&self) {
        let mut remaining = self.lock();
        while *remaining > 0 {
            remaining = self
                .reached
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until every expected signal has arrived or `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.lock();
        while *remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            remaining = self
                .reached
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Signals still outstanding.
    pub fn remaining(&self) -> usize {
        *self.lock()
    }

    /// Re-arm the barrier to expect `count` further signals.
    pub fn reset(&self, count: usize) {
        *self.lock() = count;
        if count == 0 {
            self.reached.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
