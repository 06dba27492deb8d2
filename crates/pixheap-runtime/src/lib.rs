#![forbid(unsafe_code)]

//! Runtime: opaque addresses, the allocation table, the presenter thread,
//! configuration, and the [`Context`] that ties them to a pixel backend.
//!
//! # Role in pixheap
//! `pixheap-runtime` is where state lives. It owns the backend behind a
//! single mutex, runs the background presenter, and enforces the teardown
//! order (stop presenter, then release backend).

pub mod address;
pub mod allocator;
pub mod config;
pub mod context;
pub mod debug_trace;
pub mod presenter;
pub mod stop_signal;

pub use address::Address;
pub use allocator::{Allocation, AllocationTable, AllocatorStats, DEFAULT_TABLE_CAPACITY};
pub use config::{DEFAULT_REFRESH_HZ, DEFAULT_SHUTDOWN_TIMEOUT, HeapConfig, SurfaceMode};
pub use context::{Context, PerfCounters};
pub use presenter::{Presenter, PresenterProbe, StopOutcome};
pub use stop_signal::{StopSignal, StopTrigger};
