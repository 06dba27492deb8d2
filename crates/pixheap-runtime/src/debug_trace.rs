#![forbid(unsafe_code)]

//! Zero-cost debug tracing controlled by environment variable.
//!
//! Set `PIXHEAP_DEBUG_TRACE=1` to print presenter heartbeats and lifecycle
//! transitions to stderr. When unset, every trace point is a single static
//! bool load.
//!
//! ```ignore
//! use pixheap_runtime::debug_trace;
//! debug_trace!("presenter frame {}", frames);
//! ```

use std::sync::LazyLock;
use std::time::Instant;

/// Environment variable that enables the tracer.
pub const DEBUG_TRACE_ENV: &str = "PIXHEAP_DEBUG_TRACE";

static DEBUG_TRACE_ENABLED: LazyLock<bool> = LazyLock::new(|| {
    std::env::var(DEBUG_TRACE_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
});

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Check if debug tracing is enabled.
#[inline]
pub fn is_enabled() -> bool {
    *DEBUG_TRACE_ENABLED
}

/// Milliseconds since the first trace call.
#[inline]
pub fn elapsed_ms() -> u64 {
    START_TIME.elapsed().as_millis() as u64
}

/// Print a timestamped line to stderr when `PIXHEAP_DEBUG_TRACE=1`.
#[macro_export]
macro_rules! debug_trace {
    ($($arg:tt)*) => {
        if $crate::debug_trace::is_enabled() {
            eprintln!(
                "[PIXHEAP {:>8}ms] {}",
                $crate::debug_trace::elapsed_ms(),
                format_args!($($arg)*)
            );
        }
    };
}
