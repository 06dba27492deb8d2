#![forbid(unsafe_code)]

//! Core: colors, cell geometry, the error taxonomy, and the pixel backend
//! boundary.
//!
//! # Role in pixheap
//! `pixheap-core` is the leaf crate. It defines what a pixel is, how cells
//! sit on a surface, which errors exist, and the three-call contract
//! (`set_pixel`/`get_pixel`/`present`) every backend implements. It never
//! touches a real display.

pub mod backend;
pub mod capabilities;
pub mod color;
pub mod error;
pub mod geometry;
pub mod logging;

pub use backend::{BackendFactory, BackendKind, PixelBackend, select_backend};
pub use capabilities::{CapabilitySet, ProbeInputs, probe_capabilities};
pub use color::{Argb, Palette};
pub use error::{BackendError, Exhaustion, HeapError, IntegrityFault};
pub use geometry::{CELL_RUN, CellGrid, CellLayout, PixelPos, SurfaceSize};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
