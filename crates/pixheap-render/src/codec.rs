#![forbid(unsafe_code)]

//! Byte to pixel codec.
//!
//! Each byte occupies one cell: a run of [`CELL_RUN`] pixels holding a
//! start marker, eight bit pixels (most significant bit first), and an end
//! marker. Cell placement comes from a [`CellGrid`]; colors come from a
//! [`Palette`].
//!
//! ```text
//! byte 0x48 = 0b0100_1000
//!   [S][0][1][0][0][1][0][0][0][E]
//!    ^                          ^
//!    start_marker               end_marker
//! ```
//!
//! # Classification
//!
//! Pixels are compared on RGB only; alpha is ignored so a backend that
//! premultiplies or drops alpha still decodes correctly. [`CellCodec::decode`]
//! is lenient (unknown pixels read as `0`); [`CellCodec::decode_strict`]
//! rejects any cell whose markers or bit pixels do not match the palette.
//!
//! # Bounds
//!
//! Cells at or past [`CellGrid::capacity`] are ignored by `encode` and
//! `clear` and decode as `0`. Callers validate ranges before calling in.

use pixheap_core::backend::PixelBackend;
use pixheap_core::color::Palette;
use pixheap_core::error::{HeapError, IntegrityFault};
use pixheap_core::geometry::{CELL_RUN, CellGrid, PixelPos};

/// Offset of the first bit pixel inside a run.
const FIRST_BIT: u16 = 1;

/// Offset of the end marker inside a run.
const END_MARKER: u16 = CELL_RUN - 1;

/// Encodes bytes into cells of a pixel backend and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCodec {
    grid: CellGrid,
    palette: Palette,
}

impl CellCodec {
    /// Create a codec. Fails if the palette cannot be decoded unambiguously.
    pub fn new(grid: CellGrid, palette: Palette) -> Result<Self, HeapError> {
        if !palette.is_unambiguous() {
            return Err(HeapError::Configuration(
                "palette bit colors collide with each other or with markers/background".into(),
            ));
        }
        Ok(Self { grid, palette })
    }

    /// Cell grid in use.
    #[inline]
    pub const fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Palette in use.
    #[inline]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Number of bytes the surface can hold.
    #[inline]
    pub const fn capacity(&self) -> u32 {
        self.grid.capacity()
    }

    /// Write `byte` into `cell`.
    pub fn encode<B: PixelBackend + ?Sized>(&self, backend: &mut B, cell: u32, byte: u8) {
        let Some(PixelPos { x, y }) = self.grid.origin(cell) else {
            return;
        };
        backend.set_pixel(x, y, self.palette.start_marker);
        for bit in 0..8u16 {
            let set = byte & (0x80 >> bit) != 0;
            backend.set_pixel(x + FIRST_BIT + bit, y, self.palette.bit_color(set));
        }
        backend.set_pixel(x + END_MARKER, y, self.palette.end_marker);
    }

    /// Read the byte in `cell`. Pixels matching neither bit color read as `0`.
    pub fn decode<B: PixelBackend + ?Sized>(&self, backend: &B, cell: u32) -> u8 {
        let Some(PixelPos { x, y }) = self.grid.origin(cell) else {
            return 0;
        };
        (0..8u16).fold(0u8, |acc, bit| {
            let pixel = backend.get_pixel(x + FIRST_BIT + bit, y);
            (acc << 1) | u8::from(self.palette.classify(pixel).unwrap_or(false))
        })
    }

    /// Read the byte in `cell`, or `None` if the cell is not a well-formed
    /// run.
    pub fn decode_strict<B: PixelBackend + ?Sized>(&self, backend: &B, cell: u32) -> Option<u8> {
        let PixelPos { x, y } = self.grid.origin(cell)?;
        if !backend.get_pixel(x, y).rgb_eq(self.palette.start_marker)
            || !backend
                .get_pixel(x + END_MARKER, y)
                .rgb_eq(self.palette.end_marker)
        {
            return None;
        }
        let mut byte = 0u8;
        for bit in 0..8u16 {
            let value = self.palette.classify(backend.get_pixel(x + FIRST_BIT + bit, y))?;
            byte = (byte << 1) | u8::from(value);
        }
        Some(byte)
    }

    /// Paint `cell` with the background color.
    pub fn clear<B: PixelBackend + ?Sized>(&self, backend: &mut B, cell: u32) {
        let Some(PixelPos { x, y }) = self.grid.origin(cell) else {
            return;
        };
        for dx in 0..CELL_RUN {
            backend.set_pixel(x + dx, y, self.palette.background);
        }
    }

    /// Encode `bytes` into consecutive cells starting at `start`.
    pub fn encode_run<B: PixelBackend + ?Sized>(&self, backend: &mut B, start: u32, bytes: &[u8]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("encode_run", start, len = bytes.len()).entered();
        for (cell, &byte) in (start..).zip(bytes) {
            self.encode(backend, cell, byte);
        }
    }

    /// Decode consecutive cells starting at `start` into `buf`.
    pub fn decode_run<B: PixelBackend + ?Sized>(&self, backend: &B, start: u32, buf: &mut [u8]) {
        for (cell, slot) in (start..).zip(buf.iter_mut()) {
            *slot = self.decode(backend, cell);
        }
    }

    /// Strictly decode consecutive cells starting at `start` into `buf`.
    ///
    /// Stops at the first malformed cell.
    pub fn decode_run_strict<B: PixelBackend + ?Sized>(
        &self,
        backend: &B,
        start: u32,
        buf: &mut [u8],
    ) -> Result<(), IntegrityFault> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("decode_run_strict", start, len = buf.len()).entered();
        for (cell, slot) in (start..).zip(buf.iter_mut()) {
            *slot = self
                .decode_strict(backend, cell)
                .ok_or(IntegrityFault::Undecodable { cell })?;
        }
        Ok(())
    }

    /// Paint `len` consecutive cells starting at `start` with the background.
    pub fn clear_run<B: PixelBackend + ?Sized>(&self, backend: &mut B, start: u32, len: u32) {
        for cell in start..start.saturating_add(len) {
            self.clear(backend, cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SoftwareSurface;
    use pixheap_core::color::Argb;
    use pixheap_core::geometry::{CellLayout, SurfaceSize};

    fn setup() -> (CellCodec, SoftwareSurface) {
        let size = SurfaceSize::new(40, 8);
        let grid = CellGrid::new(size, CellLayout::DEFAULT).unwrap();
        let codec = CellCodec::new(grid, Palette::DEFAULT).unwrap();
        (codec, SoftwareSurface::new(size))
    }

    #[test]
    fn encodes_msb_first_between_markers() {
        let (codec, mut surface) = setup();
        codec.encode(&mut surface, 0, 0x48);
        let palette = Palette::DEFAULT;
        assert_eq!(surface.get_pixel(0, 0), palette.start_marker);
        assert_eq!(surface.get_pixel(9, 0), palette.end_marker);
        let bits: Vec<bool> = (1..9)
            .map(|x| surface.get_pixel(x, 0) == palette.bit1)
            .collect();
        assert_eq!(
            bits,
            [false, true, false, false, true, false, false, false]
        );
    }

    #[test]
    fn cell_placement_follows_grid() {
        let (codec, mut surface) = setup();
        // 4 cells per row, row pitch 2: cell 5 is row 1, col 1.
        codec.encode(&mut surface, 5, 0xFF);
        assert_eq!(surface.get_pixel(10, 2), Palette::DEFAULT.start_marker);
        assert_eq!(codec.decode(&surface, 5), 0xFF);
    }

    #[test]
    fn decode_ignores_alpha() {
        let (codec, mut surface) = setup();
        codec.encode(&mut surface, 1, 0b1010_0101);
        for x in 10..20 {
            let p = surface.get_pixel(x, 0);
            surface.set_pixel(x, 0, p.with_alpha(0x40));
        }
        assert_eq!(codec.decode(&surface, 1), 0b1010_0101);
        assert_eq!(codec.decode_strict(&surface, 1), Some(0b1010_0101));
    }

    #[test]
    fn unknown_pixels_read_as_zero() {
        let (codec, mut surface) = setup();
        codec.encode(&mut surface, 0, 0xFF);
        surface.set_pixel(1, 0, Argb::rgb(10, 200, 30));
        assert_eq!(codec.decode(&surface, 0), 0x7F);
        assert_eq!(codec.decode_strict(&surface, 0), None);
    }

    #[test]
    fn strict_decode_requires_markers() {
        let (codec, mut surface) = setup();
        codec.encode(&mut surface, 2, 0x00);
        surface.set_pixel(29, 0, Argb::GRAY);
        assert_eq!(codec.decode(&surface, 2), 0x00);
        assert_eq!(codec.decode_strict(&surface, 2), None);
    }

    #[test]
    fn clear_paints_background() {
        let (codec, mut surface) = setup();
        codec.encode(&mut surface, 3, 0xAB);
        codec.clear(&mut surface, 3);
        assert!((30..40).all(|x| surface.get_pixel(x, 0) == Palette::DEFAULT.background));
        assert_eq!(codec.decode(&surface, 3), 0);
        assert_eq!(codec.decode_strict(&surface, 3), None);
    }

    #[test]
    fn out_of_bounds_cells_are_inert() {
        let (codec, mut surface) = setup();
        let past = codec.capacity();
        codec.encode(&mut surface, past, 0xFF);
        codec.clear(&mut surface, past);
        assert_eq!(codec.decode(&surface, past), 0);
        assert_eq!(codec.decode_strict(&surface, past), None);
        assert!(surface.pixels().iter().all(|p| *p == Argb::TRANSPARENT));
    }

    #[test]
    fn runs_round_trip() {
        let (codec, mut surface) = setup();
        codec.encode_run(&mut surface, 2, b"HELLO");
        let mut buf = [0u8; 5];
        codec.decode_run(&surface, 2, &mut buf);
        assert_eq!(&buf, b"HELLO");
        codec.decode_run_strict(&surface, 2, &mut buf).unwrap();
        assert_eq!(&buf, b"HELLO");
    }

    #[test]
    fn strict_run_reports_first_bad_cell() {
        let (codec, mut surface) = setup();
        codec.encode_run(&mut surface, 0, b"abc");
        codec.clear(&mut surface, 1);
        let mut buf = [0u8; 3];
        assert_eq!(
            codec.decode_run_strict(&surface, 0, &mut buf),
            Err(IntegrityFault::Undecodable { cell: 1 })
        );
    }

    #[test]
    fn ambiguous_palette_is_rejected() {
        let grid = CellGrid::new(SurfaceSize::new(40, 8), CellLayout::DEFAULT).unwrap();
        let palette = Palette {
            background: Palette::DEFAULT.bit0,
            ..Palette::DEFAULT
        };
        assert!(matches!(
            CellCodec::new(grid, palette),
            Err(HeapError::Configuration(_))
        ));
    }
}
