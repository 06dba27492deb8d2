//! Property-based invariant tests for cell geometry.
//!
//! 1. Capacity equals `cells_per_row * rows` and matches the closed formula.
//! 2. Every cell below capacity has a run fully inside the surface.
//! 3. Distinct cells never share a pixel.
//! 4. Row/column decomposition round-trips.
//! 5. Cells at or past capacity have no origin.

use pixheap_core::geometry::{CELL_RUN, CellGrid, CellLayout, SurfaceSize};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn grid_strategy() -> impl Strategy<Value = CellGrid> {
    (
        16u16..=1024,
        16u16..=1024,
        CELL_RUN..=24,
        1u16..=4,
        0u16..=8,
        0u16..=8,
    )
        .prop_filter_map("grid holds no cells", |(w, h, px, py, mx, my)| {
            CellGrid::new(
                SurfaceSize::new(w, h),
                CellLayout::new(px, py).with_margins(mx, my),
            )
            .ok()
        })
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Capacity formula
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn capacity_matches_formula(grid in grid_strategy()) {
        let size = grid.size();
        let layout = grid.layout();
        let expected = u32::from((size.width - layout.margin_x) / layout.pitch_x)
            * u32::from((size.height - layout.margin_y) / layout.pitch_y);
        prop_assert_eq!(grid.capacity(), expected);
        prop_assert_eq!(grid.capacity(), grid.cells_per_row() * grid.rows());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Runs stay inside the surface
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn every_cell_fits(grid in grid_strategy(), pick in any::<u32>()) {
        let cell = pick % grid.capacity();
        let origin = grid.origin(cell);
        prop_assert!(origin.is_some(), "cell {} has no origin in {:?}", cell, grid);
        let origin = origin.unwrap();
        prop_assert!(u32::from(origin.x) + u32::from(CELL_RUN) <= u32::from(grid.size().width));
        prop_assert!(origin.y < grid.size().height);
        prop_assert!(origin.x >= grid.layout().margin_x);
        prop_assert!(origin.y >= grid.layout().margin_y);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. No overlap
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn distinct_cells_do_not_overlap(grid in grid_strategy(), a in any::<u32>(), b in any::<u32>()) {
        let (a, b) = (a % grid.capacity(), b % grid.capacity());
        prop_assume!(a != b);
        let oa = grid.origin(a).unwrap();
        let ob = grid.origin(b).unwrap();
        let same_row = oa.y == ob.y;
        let disjoint_x = oa.x + CELL_RUN <= ob.x || ob.x + CELL_RUN <= oa.x;
        prop_assert!(!same_row || disjoint_x, "cells {} and {} overlap", a, b);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4 & 5. Row/col round trip and out-of-range cells
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn row_col_round_trip(grid in grid_strategy(), pick in any::<u32>()) {
        let cell = pick % grid.capacity();
        let (row, col) = grid.row_col(cell);
        prop_assert_eq!(grid.cell_at(row, col), Some(cell));
    }

    #[test]
    fn past_capacity_has_no_origin(grid in grid_strategy(), extra in 0u32..1000) {
        prop_assert_eq!(grid.origin(grid.capacity() + extra), None);
    }
}
