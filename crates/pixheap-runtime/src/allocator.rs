#![forbid(unsafe_code)]

//! Allocation table: address-space bookkeeping over surface cells.
//!
//! The table tracks a fixed number of slots. Each live allocation owns one
//! slot and a contiguous range of cells starting above the reserved header
//! region:
//!
//! ```text
//! cell 0            reserved          bump
//! |---- header ----|-- A --|  hole  |-- C --|.......... free ..........|
//!                                            ^ next allocation lands here
//! ```
//!
//! # Placement
//!
//! Allocation is a bump pointer over the currently active allocations: a
//! new allocation starts at the highest end of any live range. Freeing the
//! topmost allocation lowers the bump pointer; freeing anything below it
//! leaves a hole that is never reused. [`AllocatorStats::hole_bytes`]
//! reports the exact size of those holes.
//!
//! # Handles
//!
//! Freeing bumps the slot generation, so every [`Address`] minted before the
//! free stops resolving. `free` on such a handle is
//! [`HeapError::NotFound`]; `read`/`write` are [`HeapError::InvalidAddress`].
//! A slot whose generation reaches `u16::MAX` is retired rather than wrapped,
//! so an old handle can never match a later allocation. Retired slots count
//! against the table capacity.
//!
//! # Integrity mode
//!
//! With integrity on, each allocation is followed by a
//! [`TRAILER_LEN`]-cell [`Trailer`]. Every write re-seals it over the full
//! payload and every read verifies it, so corrupted pixels surface as
//! [`HeapError::IntegrityViolation`] instead of wrong bytes.

use std::time::SystemTime;

use pixheap_core::backend::PixelBackend;
use pixheap_core::error::{HeapError, Result};
use pixheap_render::codec::CellCodec;
use pixheap_render::integrity::{TRAILER_LEN, Trailer};

use crate::address::Address;

/// Default number of allocation table slots.
pub const DEFAULT_TABLE_CAPACITY: u16 = 256;

/// Snapshot of one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Handle the allocation was created with.
    pub address: Address,
    /// Payload size in bytes.
    pub size: usize,
    /// Optional caller-supplied label.
    pub label: Option<String>,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
    /// False once freed.
    pub active: bool,
}

/// Allocator counters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AllocatorStats {
    /// Payload bytes held by live allocations.
    pub allocated: usize,
    /// High-water mark of `allocated`.
    pub peak: usize,
    /// Approximate fragmentation, `0.0..=100.0`.
    ///
    /// This scales with the number of live allocations relative to the table
    /// size; it is not a hole measurement. See `hole_bytes` for that.
    pub fragmentation_percent: f32,
    /// Number of live allocations.
    pub active_allocations: usize,
    /// Number of table slots.
    pub table_capacity: usize,
    /// Bytes available to allocations (surface capacity minus the header).
    pub capacity_bytes: usize,
    /// Offset where the next allocation would start.
    pub bump_offset: usize,
    /// Cells below the bump offset that no live allocation covers.
    pub hole_bytes: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    address: Address,
    offset: usize,
    size: usize,
    /// Cells covered, trailer included.
    cells: usize,
    label: Option<String>,
    created_at: SystemTime,
}

impl Entry {
    fn end(&self) -> usize {
        self.offset + self.cells
    }
}

/// Generation at which a slot is retired instead of wrapping back to 0.
const RETIRED_GENERATION: u16 = u16::MAX;

#[derive(Debug, Clone, Default)]
struct Slot {
    /// Generation the next allocation in this slot will carry.
    generation: u16,
    active: bool,
    entry: Option<Entry>,
}

impl Slot {
    fn is_free(&self) -> bool {
        !self.active && self.generation != RETIRED_GENERATION
    }
}

/// Cells needed for a `size`-byte payload, or `None` if that overflows.
#[inline]
const fn footprint(size: usize, integrity: bool) -> Option<usize> {
    if integrity {
        size.checked_add(TRAILER_LEN)
    } else {
        Some(size)
    }
}

/// Bookkeeping for every allocation on one surface.
#[derive(Debug, Clone)]
pub struct AllocationTable {
    codec: CellCodec,
    slots: Vec<Slot>,
    /// First cell available to allocations.
    base_cell: u32,
    /// Cells available above `base_cell`.
    capacity: usize,
    integrity: bool,
    allocated: usize,
    peak: usize,
}

impl AllocationTable {
    /// Create a table with `table_capacity` slots over the cells of `codec`,
    /// skipping the first `reserved_cells`.
    pub fn new(
        codec: CellCodec,
        table_capacity: u16,
        reserved_cells: u32,
        integrity: bool,
    ) -> Result<Self> {
        if table_capacity == 0 {
            return Err(HeapError::Configuration(
                "allocation table capacity must be >= 1".into(),
            ));
        }
        let total = codec.capacity();
        if reserved_cells >= total {
            return Err(HeapError::Configuration(format!(
                "surface holds {total} cells, not enough for {reserved_cells} reserved cells"
            )));
        }
        Ok(Self {
            codec,
            slots: vec![Slot::default(); usize::from(table_capacity)],
            base_cell: reserved_cells,
            capacity: (total - reserved_cells) as usize,
            integrity,
            allocated: 0,
            peak: 0,
        })
    }

    /// Codec used for every cell access.
    #[inline]
    pub const fn codec(&self) -> &CellCodec {
        &self.codec
    }

    /// Whether allocations carry an integrity trailer.
    #[inline]
    pub const fn integrity(&self) -> bool {
        self.integrity
    }

    fn live(&self) -> impl Iterator<Item = &Entry> {
        self.slots
            .iter()
            .filter(|slot| slot.active)
            .filter_map(|slot| slot.entry.as_ref())
    }

    fn bump_offset(&self) -> usize {
        self.live()
            .map(Entry::end)
            .max()
            .unwrap_or(0)
    }

    fn cell_of(&self, offset: usize) -> u32 {
        // Offsets never exceed `capacity`, which came from a u32.
        self.base_cell + offset as u32
    }

    /// Resolve a live allocation.
    fn resolve(&self, address: Address) -> Option<&Entry> {
        let slot = self.slots.get(usize::from(address.slot()))?;
        let entry = slot.entry.as_ref()?;
        (slot.active && entry.address == address).then_some(entry)
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc<B: PixelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        size: usize,
        label: Option<&str>,
    ) -> Result<Address> {
        if size == 0 {
            return Err(HeapError::Configuration("allocation size must be >= 1".into()));
        }
        let slot_index = self
            .slots
            .iter()
            .position(Slot::is_free)
            .ok_or_else(HeapError::table_full)?;

        let offset = self.bump_offset();
        let available = self.capacity - offset;
        let Some(needed) = footprint(size, self.integrity) else {
            tracing::debug!(size, available, "allocation size overflows");
            return Err(HeapError::too_large(size, available));
        };
        if needed > available {
            tracing::debug!(size, needed, available, "allocation does not fit");
            return Err(HeapError::too_large(needed, available));
        }

        let cell = self.cell_of(offset);
        // Slot count came from a u16.
        let slot = &mut self.slots[slot_index];
        let address = Address::new(cell, slot_index as u16, slot.generation);
        slot.active = true;
        slot.entry = Some(Entry {
            address,
            offset,
            size,
            cells: needed,
            label: label.map(str::to_owned),
            created_at: SystemTime::now(),
        });

        let zeros = vec![0u8; size];
        self.store(backend, cell, &zeros);

        self.allocated += size;
        self.peak = self.peak.max(self.allocated);
        tracing::debug!(%address, size, cell, label = ?label, "allocated");
        Ok(address)
    }

    /// Release an allocation and paint its cells with the background color.
    pub fn free<B: PixelBackend + ?Sized>(&mut self, backend: &mut B, address: Address) -> Result<()> {
        let Some(entry) = self.resolve(address) else {
            tracing::debug!(%address, "free of unknown address");
            return Err(HeapError::NotFound {
                address: address.to_raw(),
            });
        };
        let size = entry.size;
        let cells = entry.cells as u32;
        self.codec.clear_run(backend, address.cell(), cells);

        let slot = &mut self.slots[usize::from(address.slot())];
        slot.active = false;
        // Live generations are below RETIRED_GENERATION, so this never wraps.
        slot.generation += 1;
        if slot.generation == RETIRED_GENERATION {
            tracing::debug!(slot = address.slot(), "slot retired");
        }
        self.allocated -= size;
        tracing::debug!(%address, size, "freed");
        Ok(())
    }

    /// Write `data` to the start of an allocation.
    pub fn write<B: PixelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        address: Address,
        data: &[u8],
    ) -> Result<()> {
        let entry = self.resolve(address).ok_or(HeapError::InvalidAddress {
            address: address.to_raw(),
        })?;
        let size = entry.size;
        if data.len() > size {
            return Err(HeapError::LengthOutOfRange {
                len: data.len(),
                size,
            });
        }
        tracing::trace!(%address, len = data.len(), "write");

        if !self.integrity {
            self.codec.encode_run(backend, address.cell(), data);
            return Ok(());
        }
        // The trailer covers the whole payload, so a short write has to
        // merge with the (verified) bytes it leaves untouched.
        let mut payload = if data.len() == size {
            Vec::new()
        } else {
            self.load_verified(&*backend, address.cell(), size)?
        };
        payload.resize(size, 0);
        payload[..data.len()].copy_from_slice(data);
        self.store(backend, address.cell(), &payload);
        Ok(())
    }

    /// Read the first `buf.len()` bytes of an allocation.
    pub fn read<B: PixelBackend + ?Sized>(
        &self,
        backend: &B,
        address: Address,
        buf: &mut [u8],
    ) -> Result<()> {
        let entry = self.resolve(address).ok_or(HeapError::InvalidAddress {
            address: address.to_raw(),
        })?;
        let size = entry.size;
        if buf.len() > size {
            return Err(HeapError::LengthOutOfRange {
                len: buf.len(),
                size,
            });
        }
        tracing::trace!(%address, len = buf.len(), "read");

        if self.integrity {
            let payload = self.load_verified(backend, address.cell(), size)?;
            buf.copy_from_slice(&payload[..buf.len()]);
        } else {
            self.codec.decode_run(backend, address.cell(), buf);
        }
        Ok(())
    }

    /// Move an allocation to a fresh range of `new_size` bytes.
    ///
    /// The first `min(old, new)` bytes are copied, the old allocation is
    /// freed, and the new handle is returned. If the new allocation cannot
    /// be made or filled, it is released again and the old one is left
    /// untouched.
    pub fn realloc<B: PixelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        address: Address,
        new_size: usize,
    ) -> Result<Address> {
        let (old_size, label) = {
            let entry = self.resolve(address).ok_or(HeapError::InvalidAddress {
                address: address.to_raw(),
            })?;
            (entry.size, entry.label.clone())
        };
        let mut keep = vec![0u8; old_size.min(new_size)];
        self.read(&*backend, address, &mut keep)?;

        let moved = self.alloc(backend, new_size, label.as_deref())?;
        if let Err(err) = self.write(backend, moved, &keep) {
            self.free(backend, moved)?;
            return Err(err);
        }
        self.free(backend, address)?;
        tracing::debug!(from = %address, to = %moved, old_size, new_size, "reallocated");
        Ok(moved)
    }

    /// Snapshot of the allocation `address` was minted for.
    ///
    /// Freed allocations stay visible with `active == false` until their
    /// slot is reused.
    pub fn allocation(&self, address: Address) -> Option<Allocation> {
        let slot = self.slots.get(usize::from(address.slot()))?;
        let entry = slot.entry.as_ref()?;
        (entry.address == address).then(|| Allocation {
            address: entry.address,
            size: entry.size,
            label: entry.label.clone(),
            created_at: entry.created_at,
            active: slot.active,
        })
    }

    /// Snapshots of every live allocation in address order.
    pub fn allocations(&self) -> Vec<Allocation> {
        let mut live: Vec<&Entry> = self.live().collect();
        live.sort_by_key(|entry| entry.offset);
        live.into_iter()
            .map(|entry| Allocation {
                address: entry.address,
                size: entry.size,
                label: entry.label.clone(),
                created_at: entry.created_at,
                active: true,
            })
            .collect()
    }

    /// Current counters.
    pub fn stats(&self) -> AllocatorStats {
        let active_allocations = self.live().count();
        let covered: usize = self.live().map(|e| e.cells).sum();
        let bump_offset = self.bump_offset();
        let table_capacity = self.slots.len();
        let fragmentation_percent =
            (active_allocations as f32 / table_capacity as f32 * 100.0).min(100.0);
        AllocatorStats {
            allocated: self.allocated,
            peak: self.peak,
            fragmentation_percent,
            active_allocations,
            table_capacity,
            capacity_bytes: self.capacity,
            bump_offset,
            hole_bytes: bump_offset - covered,
        }
    }

    /// Encode a full payload, sealing it in integrity mode.
    fn store<B: PixelBackend + ?Sized>(&self, backend: &mut B, cell: u32, payload: &[u8]) {
        self.codec.encode_run(backend, cell, payload);
        if self.integrity {
            let trailer = Trailer::seal(payload).to_bytes();
            self.codec
                .encode_run(backend, cell + payload.len() as u32, &trailer);
        }
    }

    /// Strictly decode a payload and check it against its trailer.
    fn load_verified<B: PixelBackend + ?Sized>(
        &self,
        backend: &B,
        cell: u32,
        size: usize,
    ) -> Result<Vec<u8>> {
        let mut payload = vec![0u8; size];
        let mut trailer = [0u8; TRAILER_LEN];
        self.codec
            .decode_run_strict(backend, cell, &mut payload)
            .and_then(|()| {
                self.codec
                    .decode_run_strict(backend, cell + size as u32, &mut trailer)
            })
            .and_then(|()| Trailer::from_bytes(trailer).verify(&payload))
            .map_err(|fault| {
                tracing::warn!(cell, size, %fault, "integrity check failed");
                HeapError::IntegrityViolation(fault)
            })?;
        Ok(payload)
    }
}
