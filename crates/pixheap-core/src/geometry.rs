#![forbid(unsafe_code)]

//! Surface and cell geometry.
//!
//! A surface is a `width x height` pixel grid. Bytes are stored in *cells*:
//! horizontal runs of [`CELL_RUN`] pixels laid out on a regular grid
//! described by a [`CellLayout`].
//!
//! ```text
//!  margin_x
//!  |<->|
//!      +--+--+--+--+--+--+--+--+--+--+     +--+--
//!      |S |b7|b6|b5|b4|b3|b2|b1|b0|E |     |S |b7 ...   row 0
//!      +--+--+--+--+--+--+--+--+--+--+     +--+--
//!      |<--------- pitch_x ------------->|
//!      (pitch_y - 1 spacer rows)
//!      +--+--+-- ...                                    row 1
//! ```
//!
//! # Invariants
//!
//! 1. `pitch_x >= CELL_RUN` and `pitch_y >= 1`, so cells never overlap.
//! 2. Every cell index below [`CellGrid::capacity`] maps to a run that lies
//!    entirely inside the surface.
//! 3. Cell indices are row-major: `index = row * cells_per_row + col`.

use crate::error::HeapError;

/// Pixels per cell run: start marker, eight bits, end marker.
pub const CELL_RUN: u16 = 10;

/// Smallest accepted surface edge, in pixels.
pub const MIN_DIMENSION: u16 = 16;

/// Largest accepted surface edge, in pixels.
pub const MAX_DIMENSION: u16 = 16384;

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
}

impl SurfaceSize {
    /// Create a new size.
    #[inline]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[inline]
    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    /// Check if a pixel coordinate lies inside the surface.
    #[inline]
    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    /// Validate the size against `[MIN_DIMENSION, MAX_DIMENSION]`.
    pub fn validate(&self) -> Result<(), HeapError> {
        let in_range = |v: u16| (MIN_DIMENSION..=MAX_DIMENSION).contains(&v);
        if in_range(self.width) && in_range(self.height) {
            Ok(())
        } else {
            Err(HeapError::Configuration(format!(
                "surface {}x{} outside [{MIN_DIMENSION}, {MAX_DIMENSION}]",
                self.width, self.height
            )))
        }
    }
}

/// A pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPos {
    /// Column (0 = left).
    pub x: u16,
    /// Row (0 = top).
    pub y: u16,
}

impl PixelPos {
    /// Create a new position.
    #[inline]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Spacing of cells on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellLayout {
    /// Horizontal distance between cell origins.
    pub pitch_x: u16,
    /// Vertical distance between cell rows.
    pub pitch_y: u16,
    /// Pixels skipped at the left edge.
    pub margin_x: u16,
    /// Pixels skipped at the top edge.
    pub margin_y: u16,
}

impl CellLayout {
    /// Tightly packed runs on every other pixel row.
    pub const DEFAULT: Self = Self {
        pitch_x: CELL_RUN,
        pitch_y: 2,
        margin_x: 0,
        margin_y: 0,
    };

    /// Create a layout with the given pitches and no margins.
    #[inline]
    pub const fn new(pitch_x: u16, pitch_y: u16) -> Self {
        Self {
            pitch_x,
            pitch_y,
            margin_x: 0,
            margin_y: 0,
        }
    }

    /// Set the leading margins.
    #[inline]
    pub const fn with_margins(mut self, margin_x: u16, margin_y: u16) -> Self {
        self.margin_x = margin_x;
        self.margin_y = margin_y;
        self
    }
}

impl Default for CellLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A validated cell grid: a layout resolved against a concrete surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellGrid {
    size: SurfaceSize,
    layout: CellLayout,
    cells_per_row: u32,
    rows: u32,
}

impl CellGrid {
    /// Resolve `layout` against `size`.
    ///
    /// Fails if the pitches are degenerate or the surface cannot hold a
    /// single cell.
    pub fn new(size: SurfaceSize, layout: CellLayout) -> Result<Self, HeapError> {
        if layout.pitch_x < CELL_RUN {
            return Err(HeapError::Configuration(format!(
                "pitch_x {} is narrower than a cell run ({CELL_RUN})",
                layout.pitch_x
            )));
        }
        if layout.pitch_y == 0 {
            return Err(HeapError::Configuration("pitch_y must be >= 1".into()));
        }
        let usable_w = size.width.saturating_sub(layout.margin_x);
        let usable_h = size.height.saturating_sub(layout.margin_y);
        let cells_per_row = u32::from(usable_w) / u32::from(layout.pitch_x);
        let rows = u32::from(usable_h) / u32::from(layout.pitch_y);
        if cells_per_row == 0 || rows == 0 {
            return Err(HeapError::Configuration(format!(
                "surface {}x{} holds no cells with pitch {}x{} and margin {}x{}",
                size.width,
                size.height,
                layout.pitch_x,
                layout.pitch_y,
                layout.margin_x,
                layout.margin_y
            )));
        }
        Ok(Self {
            size,
            layout,
            cells_per_row,
            rows,
        })
    }

    /// Surface size this grid was resolved against.
    #[inline]
    pub const fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Layout this grid was resolved from.
    #[inline]
    pub const fn layout(&self) -> CellLayout {
        self.layout
    }

    /// Cells per row: `floor((width - margin_x) / pitch_x)`.
    #[inline]
    pub const fn cells_per_row(&self) -> u32 {
        self.cells_per_row
    }

    /// Number of cell rows: `floor((height - margin_y) / pitch_y)`.
    #[inline]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of bytes the grid can hold.
    #[inline]
    pub const fn capacity(&self) -> u32 {
        self.cells_per_row * self.rows
    }

    /// Row and column of a cell index.
    #[inline]
    pub const fn row_col(&self, cell: u32) -> (u32, u32) {
        (cell / self.cells_per_row, cell % self.cells_per_row)
    }

    /// Cell index at the given row and column, if inside the grid.
    #[inline]
    pub const fn cell_at(&self, row: u32, col: u32) -> Option<u32> {
        if row < self.rows && col < self.cells_per_row {
            Some(row * self.cells_per_row + col)
        } else {
            None
        }
    }

    /// Pixel position of the cell's start marker.
    ///
    /// Returns `None` for cells outside the grid.
    pub fn origin(&self, cell: u32) -> Option<PixelPos> {
        if cell >= self.capacity() {
            return None;
        }
        let (row, col) = self.row_col(cell);
        let x = u32::from(self.layout.margin_x) + col * u32::from(self.layout.pitch_x);
        let y = u32::from(self.layout.margin_y) + row * u32::from(self.layout.pitch_y);
        let pos = PixelPos::new(u16::try_from(x).ok()?, u16::try_from(y).ok()?);
        let end_x = u32::from(pos.x) + u32::from(CELL_RUN);
        if end_x <= u32::from(self.size.width) && pos.y < self.size.height {
            Some(pos)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_on_800x600() {
        let grid = CellGrid::new(SurfaceSize::new(800, 600), CellLayout::DEFAULT).unwrap();
        assert_eq!(grid.cells_per_row(), 80);
        assert_eq!(grid.rows(), 300);
        assert_eq!(grid.capacity(), 24_000);
    }

    #[test]
    fn capacity_formula_with_margins() {
        let layout = CellLayout::new(12, 3).with_margins(5, 4);
        let grid = CellGrid::new(SurfaceSize::new(100, 50), layout).unwrap();
        assert_eq!(grid.cells_per_row(), (100 - 5) / 12);
        assert_eq!(grid.rows(), (50 - 4) / 3);
        assert_eq!(grid.capacity(), 7 * 15);
    }

    #[test]
    fn origin_is_row_major() {
        let grid = CellGrid::new(SurfaceSize::new(100, 20), CellLayout::new(10, 2)).unwrap();
        assert_eq!(grid.origin(0), Some(PixelPos::new(0, 0)));
        assert_eq!(grid.origin(9), Some(PixelPos::new(90, 0)));
        assert_eq!(grid.origin(10), Some(PixelPos::new(0, 2)));
        assert_eq!(grid.origin(grid.capacity()), None);
    }

    #[test]
    fn row_col_round_trips() {
        let grid = CellGrid::new(SurfaceSize::new(200, 40), CellLayout::DEFAULT).unwrap();
        for cell in [0, 1, 19, 20, 21, grid.capacity() - 1] {
            let (row, col) = grid.row_col(cell);
            assert_eq!(grid.cell_at(row, col), Some(cell));
        }
        assert_eq!(grid.cell_at(grid.rows(), 0), None);
    }

    #[test]
    fn narrow_pitch_rejected() {
        let err = CellGrid::new(SurfaceSize::new(100, 100), CellLayout::new(9, 1)).unwrap_err();
        assert!(matches!(err, HeapError::Configuration(_)));
    }

    #[test]
    fn zero_row_pitch_rejected() {
        let err = CellGrid::new(SurfaceSize::new(100, 100), CellLayout::new(10, 0)).unwrap_err();
        assert!(matches!(err, HeapError::Configuration(_)));
    }

    #[test]
    fn margins_swallowing_surface_rejected() {
        let layout = CellLayout::DEFAULT.with_margins(95, 0);
        assert!(CellGrid::new(SurfaceSize::new(100, 100), layout).is_err());
    }

    #[test]
    fn size_bounds() {
        assert!(SurfaceSize::new(800, 600).validate().is_ok());
        assert!(SurfaceSize::new(MIN_DIMENSION, MAX_DIMENSION).validate().is_ok());
        assert!(SurfaceSize::new(MIN_DIMENSION - 1, 600).validate().is_err());
        assert!(SurfaceSize::new(800, MAX_DIMENSION + 1).validate().is_err());
    }
}
