#![forbid(unsafe_code)]

//! Heap context: the owner of a surface, its allocation table, and its
//! presenter.
//!
//! # Locking
//!
//! The backend, the allocation table, and the operation counters live in one
//! `Mutex`. Every public operation and every presenter frame takes that lock
//! for its whole critical section, which gives sequential consistency
//! between all callers. A poisoned lock is recovered: no operation leaves the
//! state half-updated at a panic point.
//!
//! # Teardown
//!
//! [`Context::cleanup`] (also run by `Drop`) stops the presenter *before*
//! releasing the backend:
//!
//! 1. Raise the presenter's stop signal; it wakes from its sleep at once.
//! 2. Wait up to `shutdown_timeout` for the thread to exit, then join it.
//! 3. Release the backend.
//!
//! If the presenter does not exit in time it is detached and the backend is
//! *not* released; the presenter's clone of the shared state keeps the
//! backend alive until the thread finishes. Every operation after cleanup
//! returns [`HeapError::HardwareUnavailable`].

use std::sync::{Arc, Mutex, MutexGuard};

use pixheap_core::backend::{BackendFactory, BackendKind, PixelBackend, select_backend};
use pixheap_core::capabilities::probe_capabilities;
use pixheap_core::error::{BackendError, HeapError, Result};
use pixheap_core::geometry::CellGrid;
use pixheap_render::codec::CellCodec;
use pixheap_render::header::{HeaderFlags, HeapHeader};
use pixheap_render::surface::SoftwareFactory;

use crate::address::Address;
use crate::allocator::{Allocation, AllocationTable, AllocatorStats};
use crate::config::{HeapConfig, SurfaceMode};
use crate::presenter::{Presenter, PresenterProbe, StopOutcome};

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PerfCounters {
    /// Successful allocations, including realloc targets.
    pub allocs: u64,
    /// Successful frees, including realloc sources.
    pub frees: u64,
    /// Successful writes.
    pub writes: u64,
    /// Successful reads.
    pub reads: u64,
    /// Payload bytes written.
    pub bytes_written: u64,
    /// Payload bytes read.
    pub bytes_read: u64,
    /// Reads or writes rejected by integrity checks.
    pub integrity_failures: u64,
    /// Frames presented by the presenter thread.
    pub frames_presented: u64,
    /// Presenter frames whose `present()` failed.
    pub present_failures: u64,
    /// Frames presented through [`Context::present_now`].
    pub manual_presents: u64,
    /// Smoothed presenter frame rate, in Hz.
    pub frame_rate_hz: f64,
}

struct HeapState {
    /// `None` once released.
    backend: Option<Box<dyn PixelBackend>>,
    table: AllocationTable,
    perf: PerfCounters,
}

impl HeapState {
    fn backend(&mut self) -> Result<&mut (dyn PixelBackend + 'static)> {
        self.backend.as_deref_mut().ok_or_else(HeapError::torn_down)
    }

    /// Count an integrity failure on the way out.
    fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(HeapError::IntegrityViolation(_))) {
            self.perf.integrity_failures += 1;
        }
        result
    }
}

type SharedState = Arc<Mutex<HeapState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, HeapState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A pixel surface used as a byte heap.
///
/// # Example
///
/// ```
/// use pixheap_runtime::{Context, SurfaceMode};
///
/// let heap = Context::new(SurfaceMode::Software, 800, 600).unwrap();
/// let greeting = heap.alloc(13, Some("greeting")).unwrap();
/// heap.write(greeting, b"HELLO WORLD!!").unwrap();
/// assert_eq!(heap.read_vec(greeting, 13).unwrap(), b"HELLO WORLD!!");
/// heap.free(greeting).unwrap();
/// ```
pub struct Context {
    /// `None` after cleanup.
    state: Option<SharedState>,
    presenter: Option<Presenter>,
    probe: Option<PresenterProbe>,
    config: HeapConfig,
    grid: CellGrid,
    backend_kind: BackendKind,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backend_kind", &self.backend_kind)
            .field("grid", &self.grid)
            .field("presenter", &self.presenter.is_some())
            .field("torn_down", &self.state.is_none())
            .finish()
    }
}

impl Context {
    /// Create a context with only the software surface registered.
    pub fn new(mode: SurfaceMode, width: u16, height: u16) -> Result<Self> {
        let config = HeapConfig::new(width, height).with_mode(mode);
        Self::init(config, vec![Box::new(SoftwareFactory)])
    }

    /// Validate `config`, open the best backend among `factories`, paint the
    /// surface, write the header, and start the presenter.
    ///
    /// Nothing is left open if any step fails.
    pub fn init(config: HeapConfig, factories: Vec<Box<dyn BackendFactory>>) -> Result<Self> {
        let grid = config.validate()?;
        let codec = CellCodec::new(grid, config.palette)?;
        let table = AllocationTable::new(
            codec,
            config.table_capacity,
            config.reserved_cells(),
            config.integrity,
        )?;

        let caps = config
            .mode
            .restrict(config.capabilities.unwrap_or_else(probe_capabilities));
        let mut backend = select_backend(&factories, caps, config.size)?;
        let backend_kind = backend.kind();

        backend.fill(config.palette.background);
        if config.header {
            let flags = if config.integrity {
                HeaderFlags::INTEGRITY
            } else {
                HeaderFlags::empty()
            };
            HeapHeader::new(&grid, flags, config.table_capacity).write(&codec, backend.as_mut());
        }
        if let Err(err) = backend.present() {
            backend.release();
            return Err(err.into());
        }

        let state: SharedState = Arc::new(Mutex::new(HeapState {
            backend: Some(backend),
            table,
            perf: PerfCounters::default(),
        }));

        let presenter = match config.frame_interval() {
            Some(interval) => {
                let shared = Arc::clone(&state);
                let started = Presenter::start(interval, move || present_frame(&shared));
                match started {
                    Ok(presenter) => Some(presenter),
                    Err(err) => {
                        if let Some(mut backend) = lock(&state).backend.take() {
                            backend.release();
                        }
                        return Err(err);
                    }
                }
            }
            None => None,
        };
        let probe = presenter.as_ref().map(Presenter::probe);

        tracing::info!(
            backend = %backend_kind,
            width = config.size.width,
            height = config.size.height,
            capacity = grid.capacity(),
            integrity = config.integrity,
            refresh_hz = config.refresh_hz,
            "heap context initialized"
        );
        crate::debug_trace!("context up: backend={} grid={:?}", backend_kind, grid);

        Ok(Self {
            state: Some(state),
            presenter,
            probe,
            config,
            grid,
            backend_kind,
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, HeapState>> {
        self.state.as_ref().map(lock).ok_or_else(HeapError::torn_down)
    }

    /// Configuration the context was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Resolved cell grid.
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Kind of backend in use.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// Whether `cleanup` has run.
    pub fn is_torn_down(&self) -> bool {
        self.state.is_none()
    }

    /// Counters of the presenter thread, if one was started.
    ///
    /// The probe stays readable after cleanup.
    pub fn presenter_probe(&self) -> Option<PresenterProbe> {
        self.probe.clone()
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc(&self, size: usize, label: Option<&str>) -> Result<Address> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref_mut().ok_or_else(HeapError::torn_down)?;
        let address = state.table.alloc(backend, size, label)?;
        state.perf.allocs += 1;
        Ok(address)
    }

    /// Free an allocation.
    pub fn free(&self, address: Address) -> Result<()> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref_mut().ok_or_else(HeapError::torn_down)?;
        state.table.free(backend, address)?;
        state.perf.frees += 1;
        Ok(())
    }

    /// Write `data` to the start of an allocation.
    pub fn write(&self, address: Address, data: &[u8]) -> Result<()> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref_mut().ok_or_else(HeapError::torn_down)?;
        let result = state.table.write(backend, address, data);
        state.note(result)?;
        state.perf.writes += 1;
        state.perf.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Read the first `buf.len()` bytes of an allocation into `buf`.
    pub fn read(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref().ok_or_else(HeapError::torn_down)?;
        let result = state.table.read(backend, address, buf);
        state.note(result)?;
        state.perf.reads += 1;
        state.perf.bytes_read += buf.len() as u64;
        Ok(())
    }

    /// Read the first `len` bytes of an allocation.
    pub fn read_vec(&self, address: Address, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(address, &mut buf)?;
        Ok(buf)
    }

    /// Move an allocation to a new range of `new_size` bytes, keeping the
    /// first `min(old, new)` bytes. The whole move happens under one lock.
    pub fn realloc(&self, address: Address, new_size: usize) -> Result<Address> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref_mut().ok_or_else(HeapError::torn_down)?;
        let result = state.table.realloc(backend, address, new_size);
        let moved = state.note(result)?;
        state.perf.allocs += 1;
        state.perf.frees += 1;
        Ok(moved)
    }

    /// Snapshot of the allocation `address` was minted for.
    pub fn allocation(&self, address: Address) -> Result<Option<Allocation>> {
        Ok(self.state()?.table.allocation(address))
    }

    /// Snapshots of every live allocation in address order.
    pub fn allocations(&self) -> Result<Vec<Allocation>> {
        Ok(self.state()?.table.allocations())
    }

    /// Allocator counters.
    pub fn stats(&self) -> Result<AllocatorStats> {
        Ok(self.state()?.table.stats())
    }

    /// Operation and presenter counters.
    pub fn perf(&self) -> Result<PerfCounters> {
        let mut perf = self.state()?.perf;
        if let Some(probe) = &self.probe {
            perf.frames_presented = probe.frames();
            perf.present_failures = probe.failures();
            perf.frame_rate_hz = probe.frame_rate();
        }
        Ok(perf)
    }

    /// Present the surface now, on the caller's thread.
    pub fn present_now(&self) -> Result<()> {
        let mut state = self.state()?;
        state.backend()?.present()?;
        state.perf.manual_presents += 1;
        Ok(())
    }

    /// Decode and verify the header at cell 0.
    pub fn read_header(&self) -> Result<HeapHeader> {
        if !self.config.header {
            return Err(HeapError::Configuration(
                "context was created without a header".into(),
            ));
        }
        let mut guard = self.state()?;
        let state = &mut *guard;
        let backend = state.backend.as_deref().ok_or_else(HeapError::torn_down)?;
        let result = HeapHeader::read(state.table.codec(), backend);
        state.note(result)
    }

    /// Stop the presenter, then release the backend. Idempotent.
    pub fn cleanup(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        if let Some(presenter) = self.presenter.take() {
            if presenter.stop(self.config.shutdown_timeout) == StopOutcome::Detached {
                tracing::warn!(
                    backend = %self.backend_kind,
                    "presenter detached; backend left to the presenter thread"
                );
                return;
            }
        }
        if let Some(mut backend) = lock(&state).backend.take() {
            backend.release();
        }
        tracing::info!(backend = %self.backend_kind, "heap context cleaned up");
        crate::debug_trace!("context down");
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// One presenter frame. A released backend is skipped rather than reported.
fn present_frame(state: &SharedState) -> std::result::Result<(), BackendError> {
    let mut state = lock(state);
    match state.backend.as_deref_mut() {
        Some(backend) => backend.present(),
        None => Ok(()),
    }
}
