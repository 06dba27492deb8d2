#![forbid(unsafe_code)]

//! The pixel backend boundary.
//!
//! Everything above this module sees a surface only through three
//! primitives: [`PixelBackend::set_pixel`], [`PixelBackend::get_pixel`], and
//! [`PixelBackend::present`]. Concrete window-system, device, and GPU
//! wiring lives outside pixheap and plugs in through [`BackendFactory`].
//!
//! # Selection
//!
//! [`select_backend`] ranks candidates most-capable first
//! (GPU, raw device, windowed, software), skips kinds the
//! [`CapabilitySet`] rules out, and falls back to the next candidate when
//! opening fails. Candidates of equal rank keep their registration order.
//! If nothing opens, the caller gets [`HeapError::HardwareUnavailable`]
//! and no backend is left half-open.

use std::fmt;
use std::str::FromStr;

use crate::capabilities::CapabilitySet;
use crate::color::Argb;
use crate::error::{BackendError, HeapError};
use crate::geometry::SurfaceSize;

/// The kind of surface a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    /// Plain process memory.
    Software,
    /// A desktop window.
    Windowed,
    /// A raw framebuffer device.
    Device,
    /// A GPU surface.
    Gpu,
}

impl BackendKind {
    /// Every kind, most capable first.
    pub const RANKED: [Self; 4] = [Self::Gpu, Self::Device, Self::Windowed, Self::Software];

    /// Selection rank; higher is tried first.
    #[inline]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Gpu => 3,
            Self::Device => 2,
            Self::Windowed => 1,
            Self::Software => 0,
        }
    }

    /// Stable lowercase name.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Windowed => "windowed",
            Self::Device => "device",
            Self::Gpu => "gpu",
        }
    }

    /// Whether this kind is backed by real display hardware.
    #[inline]
    pub const fn is_hardware(self) -> bool {
        !matches!(self, Self::Software)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "software" | "soft" | "memory" => Ok(Self::Software),
            "windowed" | "window" => Ok(Self::Windowed),
            "device" | "fb" | "framebuffer" => Ok(Self::Device),
            "gpu" => Ok(Self::Gpu),
            _ => Err(()),
        }
    }
}

/// A pixel surface.
///
/// Implementations only need to be `Send`: the runtime serializes every
/// call behind a single mutex.
pub trait PixelBackend: Send {
    /// Kind of surface behind this backend.
    fn kind(&self) -> BackendKind;

    /// Logical surface size.
    fn size(&self) -> SurfaceSize;

    /// Store a pixel. Out-of-bounds coordinates are ignored.
    fn set_pixel(&mut self, x: u16, y: u16, color: Argb);

    /// Load a pixel. Out-of-bounds coordinates return [`Argb::TRANSPARENT`].
    fn get_pixel(&self, x: u16, y: u16) -> Argb;

    /// Flush pending pixels to the visible surface.
    fn present(&mut self) -> Result<(), BackendError>;

    /// Paint every pixel with `color`.
    fn fill(&mut self, color: Argb) {
        let size = self.size();
        for y in 0..size.height {
            for x in 0..size.width {
                self.set_pixel(x, y, color);
            }
        }
    }

    /// Release the underlying surface.
    ///
    /// Called once during teardown, after the presenter has stopped. The
    /// backend must tolerate being dropped without `release`.
    fn release(&mut self) {}
}

/// Opens backends of one kind.
pub trait BackendFactory: Send + Sync {
    /// Kind of backend this factory opens.
    fn kind(&self) -> BackendKind;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Open a surface of the requested size.
    fn open(&self, size: SurfaceSize) -> Result<Box<dyn PixelBackend>, BackendError>;
}

/// Order factories for selection: rank descending, registration order
/// within a rank, kinds missing from `caps` dropped.
pub fn ranked_candidates<'a>(
    factories: &'a [Box<dyn BackendFactory>],
    caps: CapabilitySet,
) -> Vec<&'a dyn BackendFactory> {
    let mut candidates: Vec<&dyn BackendFactory> = factories
        .iter()
        .map(AsRef::as_ref)
        .filter(|f| caps.supports(f.kind()))
        .collect();
    candidates.sort_by_key(|f| std::cmp::Reverse(f.kind().rank()));
    candidates
}

/// Open the most capable backend that works.
pub fn select_backend(
    factories: &[Box<dyn BackendFactory>],
    caps: CapabilitySet,
    size: SurfaceSize,
) -> Result<Box<dyn PixelBackend>, HeapError> {
    let mut tried = Vec::new();
    for factory in ranked_candidates(factories, caps) {
        let kind = factory.kind();
        tried.push(kind);
        match factory.open(size) {
            Ok(backend) if backend.size() == size => {
                #[cfg(feature = "tracing")]
                tracing::info!(backend = factory.name(), %kind, width = size.width, height = size.height, "backend selected");
                return Ok(backend);
            }
            Ok(mut backend) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    backend = factory.name(),
                    got_width = backend.size().width,
                    got_height = backend.size().height,
                    "backend opened with wrong size; falling back"
                );
                backend.release();
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(backend = factory.name(), error = %_err, "backend failed to open; falling back");
            }
        }
    }
    Err(HeapError::HardwareUnavailable { tried })
}
