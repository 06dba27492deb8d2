//! Shared test backends.
//!
//! [`TapFactory`] opens a software surface whose pixels stay reachable from
//! the test through a [`Tap`], so tests can corrupt pixels behind the
//! context's back and observe every `present()`/`release()` call.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pixheap_core::{
    Argb, BackendError, BackendFactory, BackendKind, CapabilitySet, PixelBackend, SurfaceSize,
};
use pixheap_render::SoftwareSurface;
use pixheap_runtime::{Context, HeapConfig};

/// Observations shared between a tapped backend and the test.
#[derive(Debug, Default)]
pub struct TapLog {
    pub opens: AtomicU64,
    pub present_calls: AtomicU64,
    pub presents: AtomicU64,
    pub presents_after_release: AtomicU64,
    pub releases: AtomicU64,
    pub released: AtomicBool,
}

/// Test-side handle to a tapped surface.
#[derive(Debug, Clone, Default)]
pub struct Tap {
    surface: Arc<Mutex<Option<SoftwareSurface>>>,
    pub log: Arc<TapLog>,
}

impl Tap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the live surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut SoftwareSurface) -> R) -> R {
        let mut guard = self.surface.lock().unwrap();
        f(guard.as_mut().expect("surface not opened"))
    }

    /// Calls to `present()`, counted on entry.
    pub fn present_calls(&self) -> u64 {
        self.log.present_calls.load(Ordering::SeqCst)
    }

    /// Completed `present()` calls.
    pub fn presents(&self) -> u64 {
        self.log.presents.load(Ordering::SeqCst)
    }

    pub fn presents_after_release(&self) -> u64 {
        self.log.presents_after_release.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.log.releases.load(Ordering::SeqCst)
    }
}

struct TappedSurface {
    kind: BackendKind,
    size: SurfaceSize,
    tap: Tap,
    present_delay: Duration,
}

impl TappedSurface {
    fn with<R>(&self, f: impl FnOnce(&mut SoftwareSurface) -> R) -> Option<R> {
        let mut guard = self.tap.surface.lock().unwrap();
        guard.as_mut().map(f)
    }
}

impl PixelBackend for TappedSurface {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn set_pixel(&mut self, x: u16, y: u16, color: Argb) {
        self.with(|s| s.set_pixel(x, y, color));
    }

    fn get_pixel(&self, x: u16, y: u16) -> Argb {
        self.with(|s| s.get_pixel(x, y)).unwrap_or(Argb::TRANSPARENT)
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.tap.log.present_calls.fetch_add(1, Ordering::SeqCst);
        if self.tap.log.released.load(Ordering::SeqCst) {
            self.tap
                .log
                .presents_after_release
                .fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::Released);
        }
        if !self.present_delay.is_zero() {
            std::thread::sleep(self.present_delay);
        }
        self.tap.log.presents.fetch_add(1, Ordering::SeqCst);
        self.with(|s| s.present()).unwrap_or(Err(BackendError::Released))
    }

    fn release(&mut self) {
        self.tap.log.released.store(true, Ordering::SeqCst);
        self.tap.log.releases.fetch_add(1, Ordering::SeqCst);
        self.with(|s| s.release());
    }
}

/// Opens [`TappedSurface`]s of a chosen kind.
pub struct TapFactory {
    pub kind: BackendKind,
    pub tap: Tap,
    pub fail: bool,
    pub present_delay: Duration,
}

impl TapFactory {
    pub fn new(kind: BackendKind, tap: &Tap) -> Self {
        Self {
            kind,
            tap: tap.clone(),
            fail: false,
            present_delay: Duration::ZERO,
        }
    }

    pub fn failing(kind: BackendKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind, &Tap::new())
        }
    }

    pub fn with_present_delay(mut self, delay: Duration) -> Self {
        self.present_delay = delay;
        self
    }

    pub fn boxed(self) -> Box<dyn BackendFactory> {
        Box::new(self)
    }
}

impl BackendFactory for TapFactory {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn open(&self, size: SurfaceSize) -> Result<Box<dyn PixelBackend>, BackendError> {
        self.tap.log.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BackendError::Open {
                kind: self.kind,
                message: "device busy".into(),
            });
        }
        *self.tap.surface.lock().unwrap() = Some(SoftwareSurface::new(size));
        Ok(Box::new(TappedSurface {
            kind: self.kind,
            size,
            tap: self.tap.clone(),
            present_delay: self.present_delay,
        }))
    }
}

/// A context on a tapped software surface with every capability allowed.
pub fn tapped_context(config: HeapConfig) -> (Context, Tap) {
    let tap = Tap::new();
    let ctx = Context::init(
        config.with_capabilities(CapabilitySet::all()),
        vec![TapFactory::new(BackendKind::Software, &tap).boxed()],
    )
    .expect("tapped context");
    (ctx, tap)
}
