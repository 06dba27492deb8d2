#![forbid(unsafe_code)]

//! In-memory software surface.
//!
//! [`SoftwareSurface`] is the reference [`PixelBackend`]: a pair of pixel
//! planes in process memory. Writes land in the back plane; `present()`
//! publishes the back plane to the front plane, which is what a display
//! would show. It is always available, so backend selection can fall back
//! to it when no hardware surface opens.
//!
//! # Layout
//!
//! Pixels are stored in row-major order: `index = y * width + x`.
//!
//! # Invariants
//!
//! 1. `back.len() == front.len() == width * height` until release; both
//!    planes are dropped by `release()` and pixel access becomes a no-op
//! 2. Width and height never change after creation
//! 3. After `release()`, `present()` fails with [`BackendError::Released`]

use pixheap_core::backend::{BackendFactory, BackendKind, PixelBackend};
use pixheap_core::color::Argb;
use pixheap_core::error::BackendError;
use pixheap_core::geometry::SurfaceSize;

/// A double-buffered pixel grid in process memory.
///
/// # Example
///
/// ```
/// use pixheap_core::{Argb, PixelBackend, SurfaceSize};
/// use pixheap_render::surface::SoftwareSurface;
///
/// let mut surface = SoftwareSurface::new(SurfaceSize::new(32, 16));
/// surface.set_pixel(3, 4, Argb::WHITE);
/// assert_eq!(surface.get_pixel(3, 4), Argb::WHITE);
/// assert_eq!(surface.front_pixel(3, 4), Argb::TRANSPARENT);
/// surface.present().unwrap();
/// assert_eq!(surface.front_pixel(3, 4), Argb::WHITE);
/// ```
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    size: SurfaceSize,
    back: Vec<Argb>,
    front: Vec<Argb>,
    frames: u64,
    released: bool,
}

impl SoftwareSurface {
    /// Create a surface with every pixel transparent.
    pub fn new(size: SurfaceSize) -> Self {
        let len = size.area() as usize;
        Self {
            size,
            back: vec![Argb::TRANSPARENT; len],
            front: vec![Argb::TRANSPARENT; len],
            frames: 0,
            released: false,
        }
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if self.size.contains(x, y) {
            Some(y as usize * self.size.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Pixel as last presented.
    pub fn front_pixel(&self, x: u16, y: u16) -> Argb {
        self.index(x, y)
            .and_then(|i| self.front.get(i).copied())
            .unwrap_or(Argb::TRANSPARENT)
    }

    /// Raw access to the back plane.
    #[inline]
    pub fn pixels(&self) -> &[Argb] {
        &self.back
    }

    /// Number of successful `present()` calls.
    #[inline]
    pub const fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Whether `release()` has been called.
    #[inline]
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl PixelBackend for SoftwareSurface {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    #[inline]
    fn set_pixel(&mut self, x: u16, y: u16, color: Argb) {
        if let Some(pixel) = self.index(x, y).and_then(|i| self.back.get_mut(i)) {
            *pixel = color;
        }
    }

    #[inline]
    fn get_pixel(&self, x: u16, y: u16) -> Argb {
        self.index(x, y)
            .and_then(|i| self.back.get(i).copied())
            .unwrap_or(Argb::TRANSPARENT)
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        self.front.copy_from_slice(&self.back);
        self.frames += 1;
        Ok(())
    }

    fn fill(&mut self, color: Argb) {
        self.back.fill(color);
    }

    fn release(&mut self) {
        self.released = true;
        self.back = Vec::new();
        self.front = Vec::new();
    }
}

/// Opens [`SoftwareSurface`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareFactory;

impl BackendFactory for SoftwareFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn open(&self, size: SurfaceSize) -> Result<Box<dyn PixelBackend>, BackendError> {
        Ok(Box::new(SoftwareSurface::new(size)))
    }
}
