#![forbid(unsafe_code)]

//! Background presenter thread.
//!
//! One presenter per context calls a frame function at a fixed rate. The
//! frame function locks the context, calls `present()`, and releases the
//! lock; the presenter sleeps between frames *outside* the lock, on its
//! [`StopSignal`], so a stop request wakes it immediately.
//!
//! # Lifecycle
//!
//! ```text
//! start() ──► [frame ─► sleep]* ──► stop requested ──► exited flag set
//!                                                      │
//! stop(timeout) ── waits on exited flag ───────────────┘
//!     ├─ set within timeout  ─► join ─► Joined
//!     └─ timeout             ─► detach ─► Detached
//! ```
//!
//! The exited flag is raised by a drop guard, so a panicking frame function
//! still counts as an exit.
//!
//! # Failures
//!
//! A failing frame is logged and counted, and the loop carries on. The
//! presenter never stops on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pixheap_core::error::{BackendError, Exhaustion, HeapError};

use crate::stop_signal::{StopSignal, StopTrigger};

/// Thread name used for every presenter.
pub const PRESENTER_THREAD_NAME: &str = "pixheap-presenter";

/// How many frames pass between debug heartbeats.
const HEARTBEAT_FRAMES: u64 = 600;

/// Weight of the newest frame in the smoothed frame rate.
const RATE_SMOOTHING: f64 = 0.1;

#[derive(Debug)]
struct Counters {
    frames: AtomicU64,
    failures: AtomicU64,
    last_frame_us: AtomicU64,
    /// Smoothed frame rate, as `f64` bits.
    rate_bits: AtomicU64,
    running: AtomicBool,
    started_at: Instant,
}

impl Counters {
    /// Fold one frame gap into the smoothed rate. Only the presenter thread
    /// writes, so load-then-store is race free.
    fn record_gap(&self, gap: Duration) {
        let secs = gap.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let sample = 1.0 / secs;
        let prev = f64::from_bits(self.rate_bits.load(Ordering::Relaxed));
        let next = if prev == 0.0 {
            sample
        } else {
            prev + RATE_SMOOTHING * (sample - prev)
        };
        self.rate_bits.store(next.to_bits(), Ordering::Relaxed);
    }
}

/// Read-only view of a presenter's counters.
///
/// Stays valid after the presenter is stopped, so callers can confirm the
/// thread has really exited.
#[derive(Debug, Clone)]
pub struct PresenterProbe {
    counters: Arc<Counters>,
}

impl PresenterProbe {
    /// Frames presented successfully.
    pub fn frames(&self) -> u64 {
        self.counters.frames.load(Ordering::Acquire)
    }

    /// Frames whose `present()` failed.
    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::Acquire)
    }

    /// Whether the presenter loop is still running.
    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::Acquire)
    }

    /// Duration of the most recent frame, including lock wait.
    pub fn last_frame_time(&self) -> Duration {
        Duration::from_micros(self.counters.last_frame_us.load(Ordering::Relaxed))
    }

    /// Current frame rate in Hz, an exponential moving average over the
    /// gaps between successful frames. Recovers within a few dozen frames
    /// after a stall.
    pub fn frame_rate(&self) -> f64 {
        f64::from_bits(self.counters.rate_bits.load(Ordering::Relaxed))
    }

    /// Successful frames per second averaged over the presenter's lifetime.
    pub fn average_frame_rate(&self) -> f64 {
        let secs = self.counters.started_at.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames() as f64 / secs
        } else {
            0.0
        }
    }
}

/// How a presenter shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The thread exited and was joined.
    Joined,
    /// The thread did not exit in time and was left to finish on its own.
    Detached,
}

/// Raises the exited flag when the loop ends, including by panic.
struct ExitGuard {
    exited: StopTrigger,
    counters: Arc<Counters>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.counters.running.store(false, Ordering::Release);
        self.exited.stop();
    }
}

/// Handle to a running presenter thread.
#[derive(Debug)]
pub struct Presenter {
    stop: StopTrigger,
    exited: StopSignal,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Presenter {
    /// Spawn a presenter calling `frame` every `interval`.
    pub fn start<F>(interval: Duration, frame: F) -> Result<Self, HeapError>
    where
        F: FnMut() -> Result<(), BackendError> + Send + 'static,
    {
        let (signal, stop) = StopSignal::new();
        let (exited, exit_trigger) = StopSignal::new();
        let counters = Arc::new(Counters {
            frames: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_frame_us: AtomicU64::new(0),
            rate_bits: AtomicU64::new(0),
            running: AtomicBool::new(true),
            started_at: Instant::now(),
        });
        let guard = ExitGuard {
            exited: exit_trigger,
            counters: Arc::clone(&counters),
        };
        let handle = thread::Builder::new()
            .name(PRESENTER_THREAD_NAME.into())
            .spawn(move || presenter_loop(interval, frame, &signal, guard))
            .map_err(|err| {
                tracing::error!(error = %err, "failed to spawn presenter thread");
                HeapError::ResourceExhausted {
                    reason: Exhaustion::Threads,
                }
            })?;
        tracing::debug!(interval_us = interval.as_micros() as u64, "presenter started");
        crate::debug_trace!("presenter started: interval={:?}", interval);
        Ok(Self {
            stop,
            exited,
            handle: Some(handle),
            counters,
        })
    }

    /// Counter view that outlives this handle.
    pub fn probe(&self) -> PresenterProbe {
        PresenterProbe {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Request stop and wait up to `timeout` for the thread to exit.
    pub fn stop(mut self, timeout: Duration) -> StopOutcome {
        self.stop.stop();
        let Some(handle) = self.handle.take() else {
            return StopOutcome::Joined;
        };
        if self.exited.wait_timeout(timeout) {
            if handle.join().is_err() {
                tracing::error!("presenter thread panicked");
            }
            crate::debug_trace!("presenter joined");
            StopOutcome::Joined
        } else {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "presenter did not stop in time; detaching"
            );
            crate::debug_trace!("presenter detached after {:?}", timeout);
            drop(handle);
            StopOutcome::Detached
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        // Never block in drop; `stop` is the joining path.
        self.stop.stop();
    }
}

fn presenter_loop<F>(interval: Duration, mut frame: F, signal: &StopSignal, guard: ExitGuard)
where
    F: FnMut() -> Result<(), BackendError>,
{
    let counters = Arc::clone(&guard.counters);
    let mut last_presented = counters.started_at;
    while !signal.is_stopped() {
        let started = Instant::now();
        match frame() {
            Ok(()) => {
                let now = Instant::now();
                counters.record_gap(now.duration_since(last_presented));
                last_presented = now;
                let frames = counters.frames.fetch_add(1, Ordering::AcqRel) + 1;
                if frames % HEARTBEAT_FRAMES == 0 {
                    crate::debug_trace!("presenter heartbeat: frames={}", frames);
                }
            }
            Err(err) => {
                counters.failures.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(error = %err, "present failed");
            }
        }
        let took = started.elapsed();
        counters
            .last_frame_us
            .store(took.as_micros() as u64, Ordering::Relaxed);
        if signal.wait_timeout(interval.saturating_sub(took)) {
            break;
        }
    }
    drop(guard);
}
