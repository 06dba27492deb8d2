#![forbid(unsafe_code)]

//! pixheap public facade crate.
//!
//! A byte heap whose storage is the pixels of a display surface. Each byte
//! is painted as a short run of colored pixels; allocations hand out opaque
//! [`Address`] handles; a background presenter keeps the surface on screen.
//!
//! ```
//! use pixheap::prelude::*;
//!
//! let ctx = Context::new(SurfaceMode::Software, 800, 600)?;
//! let greeting = ctx.alloc(13, Some("greeting"))?;
//! ctx.write(greeting, b"HELLO WORLD!!")?;
//! assert_eq!(ctx.read_vec(greeting, 13)?, b"HELLO WORLD!!");
//! ctx.free(greeting)?;
//! # Ok::<(), pixheap::HeapError>(())
//! ```
//!
//! # Features
//! - `tracing`: structured logs from every layer.
//! - `tracing-json`: adds [`init_json`] for JSON log output.
//! - `serde`: `Serialize` for [`AllocatorStats`] and [`PerfCounters`].

// --- Core re-exports -------------------------------------------------------

pub use pixheap_core::{
    Argb, BackendError, BackendFactory, BackendKind, CapabilitySet, CellGrid, CellLayout,
    Exhaustion, HeapError, IntegrityFault, Palette, PixelBackend, SurfaceSize,
};

#[cfg(feature = "tracing-json")]
pub use pixheap_core::logging::init_json;

/// Standard result type for pixheap APIs.
pub type Result<T> = std::result::Result<T, HeapError>;

// --- Render re-exports -----------------------------------------------------

pub use pixheap_render::{CellCodec, HeapHeader, SoftwareFactory, SoftwareSurface};

// --- Runtime re-exports ----------------------------------------------------

pub use pixheap_runtime::{
    Address, Allocation, AllocatorStats, Context, HeapConfig, PerfCounters, PresenterProbe,
    SurfaceMode,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Address, AllocatorStats, Context, HeapConfig, HeapError, PixelBackend, Result,
        SurfaceMode,
    };

    pub use crate::{core, render, runtime};
}

pub use pixheap_core as core;
pub use pixheap_render as render;
pub use pixheap_runtime as runtime;
