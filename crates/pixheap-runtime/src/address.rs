#![forbid(unsafe_code)]

//! Opaque allocation handles.
//!
//! An [`Address`] names an allocation by its origin cell plus the table slot
//! that tracks it and that slot's generation. Freeing an allocation bumps the
//! slot generation, so every handle minted before the free becomes stale and
//! is rejected structurally, even if a later allocation lands on the same
//! slot and origin cell.
//!
//! # Raw form
//!
//! ```text
//!  63        32 31      16 15       0
//! +------------+----------+----------+
//! |    cell    |   slot   |   gen    |
//! +------------+----------+----------+
//! ```
//!
//! The raw `u64` exists for transport across FFI-style boundaries. It is
//! never dereferenced.

use std::fmt;

use pixheap_core::geometry::CellGrid;

/// Handle to an allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    cell: u32,
    slot: u16,
    generation: u16,
}

impl Address {
    pub(crate) const fn new(cell: u32, slot: u16, generation: u16) -> Self {
        Self {
            cell,
            slot,
            generation,
        }
    }

    /// Origin cell of the allocation.
    #[inline]
    pub const fn cell(self) -> u32 {
        self.cell
    }

    /// Allocation table slot.
    #[inline]
    pub const fn slot(self) -> u16 {
        self.slot
    }

    /// Slot generation this handle was minted for.
    #[inline]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Row and column of the origin cell on `grid`.
    #[inline]
    pub const fn row_col(self, grid: &CellGrid) -> (u32, u32) {
        grid.row_col(self.cell)
    }

    /// Pack into a `u64`.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        ((self.cell as u64) << 32) | ((self.slot as u64) << 16) | self.generation as u64
    }

    /// Unpack from a `u64`. Any value is accepted; validity is checked when
    /// the address is used.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            cell: (raw >> 32) as u32,
            slot: (raw >> 16) as u16,
            generation: raw as u16,
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}@{}v{})", self.cell, self.slot, self.generation)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.to_raw())
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.to_raw()
    }
}
