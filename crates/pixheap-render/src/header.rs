#![forbid(unsafe_code)]

//! Self-describing surface header.
//!
//! A heap surface starts with [`HEADER_CELLS`] codec-encoded bytes that
//! describe how the rest of the surface is laid out, so a reader can check
//! it is looking at a heap it understands before trusting any cell.
//!
//! # Wire format
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `PXHP` |
//! | 4 | 1 | format version |
//! | 5 | 1 | [`HeaderFlags`] |
//! | 6 | 2 | surface width (LE) |
//! | 8 | 2 | surface height (LE) |
//! | 10 | 2 | `pitch_x` (LE) |
//! | 12 | 2 | `pitch_y` (LE) |
//! | 14 | 2 | `margin_x` (LE) |
//! | 16 | 2 | `margin_y` (LE) |
//! | 18 | 2 | allocation table capacity (LE) |
//! | 20 | 4 | FNV-1a 32 of bytes `0..20` (LE) |

use pixheap_core::backend::PixelBackend;
use pixheap_core::error::{HeapError, IntegrityFault};
use pixheap_core::geometry::{CellGrid, CellLayout, SurfaceSize};

use crate::codec::CellCodec;
use crate::integrity::fnv1a32;

/// Format magic.
pub const HEADER_MAGIC: [u8; 4] = *b"PXHP";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Cells reserved for the header at cell 0.
pub const HEADER_CELLS: usize = 24;

const CHECKSUM_AT: usize = HEADER_CELLS - 4;

bitflags::bitflags! {
    /// Feature flags recorded in the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeaderFlags: u8 {
        /// Allocations carry an integrity trailer.
        const INTEGRITY = 0b0000_0001;
    }
}

/// Decoded header contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapHeader {
    /// Feature flags.
    pub flags: HeaderFlags,
    /// Surface size the heap was created for.
    pub size: SurfaceSize,
    /// Cell layout the heap was created with.
    pub layout: CellLayout,
    /// Allocation table capacity.
    pub table_capacity: u16,
}

impl HeapHeader {
    /// Describe a heap on `grid`.
    pub fn new(grid: &CellGrid, flags: HeaderFlags, table_capacity: u16) -> Self {
        Self {
            flags,
            size: grid.size(),
            layout: grid.layout(),
            table_capacity,
        }
    }

    /// Whether this header describes `grid`.
    pub fn matches(&self, grid: &CellGrid) -> bool {
        self.size == grid.size() && self.layout == grid.layout()
    }

    /// Serialize, including the trailing checksum.
    pub fn to_bytes(&self) -> [u8; HEADER_CELLS] {
        let mut out = [0u8; HEADER_CELLS];
        out[..4].copy_from_slice(&HEADER_MAGIC);
        out[4] = FORMAT_VERSION;
        out[5] = self.flags.bits();
        let fields = [
            self.size.width,
            self.size.height,
            self.layout.pitch_x,
            self.layout.pitch_y,
            self.layout.margin_x,
            self.layout.margin_y,
            self.table_capacity,
        ];
        for (chunk, value) in out[6..CHECKSUM_AT].chunks_exact_mut(2).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        let checksum = fnv1a32(&out[..CHECKSUM_AT]);
        out[CHECKSUM_AT..].copy_from_slice(&checksum.to_le_bytes());
        out
    }

    /// Parse and verify a serialized header.
    pub fn from_bytes(bytes: &[u8; HEADER_CELLS]) -> Result<Self, IntegrityFault> {
        let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if found != HEADER_MAGIC {
            return Err(IntegrityFault::BadMagic { found });
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(IntegrityFault::UnsupportedVersion(bytes[4]));
        }
        let stored = u32::from_le_bytes([
            bytes[CHECKSUM_AT],
            bytes[CHECKSUM_AT + 1],
            bytes[CHECKSUM_AT + 2],
            bytes[CHECKSUM_AT + 3],
        ]);
        let computed = fnv1a32(&bytes[..CHECKSUM_AT]);
        if stored != computed {
            return Err(IntegrityFault::Checksum { stored, computed });
        }
        let field = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Ok(Self {
            flags: HeaderFlags::from_bits_truncate(bytes[5]),
            size: SurfaceSize::new(field(6), field(8)),
            layout: CellLayout::new(field(10), field(12)).with_margins(field(14), field(16)),
            table_capacity: field(18),
        })
    }

    /// Encode the header into cells `0..HEADER_CELLS`.
    pub fn write<B: PixelBackend + ?Sized>(&self, codec: &CellCodec, backend: &mut B) {
        codec.encode_run(backend, 0, &self.to_bytes());
    }

    /// Decode and verify the header from cells `0..HEADER_CELLS`.
    pub fn read<B: PixelBackend + ?Sized>(codec: &CellCodec, backend: &B) -> Result<Self, HeapError> {
        let mut bytes = [0u8; HEADER_CELLS];
        codec
            .decode_run_strict(backend, 0, &mut bytes)
            .and_then(|()| Self::from_bytes(&bytes))
            .map_err(HeapError::IntegrityViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SoftwareSurface;
    use pixheap_core::color::Palette;

    fn grid() -> CellGrid {
        CellGrid::new(SurfaceSize::new(800, 600), CellLayout::DEFAULT).unwrap()
    }

    fn header() -> HeapHeader {
        HeapHeader::new(&grid(), HeaderFlags::INTEGRITY, 256)
    }

    #[test]
    fn bytes_round_trip() {
        let h = header();
        let bytes = h.to_bytes();
        assert_eq!(&bytes[..4], b"PXHP");
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(HeapHeader::from_bytes(&bytes), Ok(h));
        assert!(h.matches(&grid()));
    }

    #[test]
    fn surface_round_trip() {
        let grid = grid();
        let codec = CellCodec::new(grid, Palette::DEFAULT).unwrap();
        let mut surface = SoftwareSurface::new(grid.size());
        header().write(&codec, &mut surface);
        assert_eq!(HeapHeader::read(&codec, &surface), Ok(header()));
    }

    #[test]
    fn tampered_field_fails_checksum() {
        let mut bytes = header().to_bytes();
        bytes[18] ^= 0x01;
        assert!(matches!(
            HeapHeader::from_bytes(&bytes),
            Err(IntegrityFault::Checksum { .. })
        ));
    }

    #[test]
    fn bad_magic_and_version() {
        let mut bytes = header().to_bytes();
        bytes[0] = b'X';
        assert_eq!(
            HeapHeader::from_bytes(&bytes),
            Err(IntegrityFault::BadMagic { found: *b"XXHP" })
        );
        let mut bytes = header().to_bytes();
        bytes[4] = 9;
        assert_eq!(
            HeapHeader::from_bytes(&bytes),
            Err(IntegrityFault::UnsupportedVersion(9))
        );
    }

    #[test]
    fn blank_surface_is_undecodable() {
        let grid = grid();
        let codec = CellCodec::new(grid, Palette::DEFAULT).unwrap();
        let surface = SoftwareSurface::new(grid.size());
        assert_eq!(
            HeapHeader::read(&codec, &surface),
            Err(HeapError::IntegrityViolation(IntegrityFault::Undecodable {
                cell: 0
            }))
        );
    }
}
