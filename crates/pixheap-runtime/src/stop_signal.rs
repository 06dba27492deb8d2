#![forbid(unsafe_code)]

//! Cooperative stop signal for background threads.
//!
//! A [`StopSignal`] is polled by the worker between units of work and doubles
//! as its sleep: [`StopSignal::wait_timeout`] blocks on a condition variable,
//! so raising the [`StopTrigger`] wakes a sleeping worker immediately instead
//! of after the rest of its interval.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

type Shared = Arc<(Mutex<bool>, Condvar)>;

/// Worker side of a stop pair.
#[derive(Debug, Clone)]
pub struct StopSignal {
    inner: Shared,
}

impl StopSignal {
    /// Create a new `(signal, trigger)` pair.
    pub fn new() -> (Self, StopTrigger) {
        let inner: Shared = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Self {
            inner: Arc::clone(&inner),
        };
        (signal, StopTrigger { inner })
    }

    /// Check if stop has been requested.
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for up to `duration`, returning early if stop is requested.
    ///
    /// Returns `true` if stopped, `false` if the full duration elapsed.
    /// Spurious wakeups resume waiting for the remaining time.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        if *stopped {
            return true;
        }

        let start = Instant::now();
        let mut remaining = duration;
        loop {
            let (guard, result) = cvar
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(|e| e.into_inner());
            stopped = guard;
            if *stopped {
                return true;
            }
            if result.timed_out() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}

/// Owner side of a stop pair.
#[derive(Debug)]
pub struct StopTrigger {
    inner: Shared,
}

impl StopTrigger {
    /// Request stop and wake every waiter. Idempotent.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}
