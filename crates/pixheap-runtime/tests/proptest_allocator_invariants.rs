//! Property-based model check for the allocation table.
//!
//! Random sequences of alloc / write / free run against a table on a small
//! software surface and against a plain `Vec` model. After every step:
//!
//! 1. Live allocations never overlap (payload plus trailer).
//! 2. Every live allocation reads back exactly what the model last wrote.
//! 3. `allocated` and `active_allocations` agree with the model.
//! 4. An allocation succeeds iff a slot is free and it fits above the
//!    highest live allocation.
//! 5. Freed handles stay dead.

use pixheap_core::geometry::{CellGrid, CellLayout, SurfaceSize};
use pixheap_core::{HeapError, Palette};
use pixheap_render::{CellCodec, SoftwareSurface, TRAILER_LEN};
use pixheap_runtime::{Address, AllocationTable};
use proptest::prelude::*;

const TABLE_SLOTS: u16 = 12;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    Write(usize, u8),
    Free(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..=40).prop_map(Op::Alloc),
        2 => (any::<usize>(), any::<u8>()).prop_map(|(i, b)| Op::Write(i, b)),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

struct Live {
    address: Address,
    size: usize,
    bytes: Vec<u8>,
}

fn footprint(size: usize, integrity: bool) -> usize {
    if integrity { size + TRAILER_LEN } else { size }
}

fn setup(integrity: bool) -> (AllocationTable, SoftwareSurface) {
    let size = SurfaceSize::new(120, 40);
    let grid = CellGrid::new(size, CellLayout::DEFAULT).unwrap();
    let codec = CellCodec::new(grid, Palette::DEFAULT).unwrap();
    let table = AllocationTable::new(codec, TABLE_SLOTS, 0, integrity).unwrap();
    let mut surface = SoftwareSurface::new(size);
    pixheap_core::PixelBackend::fill(&mut surface, Palette::DEFAULT.background);
    (table, surface)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn table_matches_model(
        integrity in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let (mut table, mut surface) = setup(integrity);
        let capacity = table.stats().capacity_bytes;
        let mut live: Vec<Live> = Vec::new();
        let mut dead: Vec<Address> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let top = live
                        .iter()
                        .map(|l| l.address.cell() as usize + footprint(l.size, integrity))
                        .max()
                        .unwrap_or(0);
                    let fits = top + footprint(size, integrity) <= capacity;
                    let slot_free = live.len() < usize::from(TABLE_SLOTS);
                    match table.alloc(&mut surface, size, None) {
                        Ok(address) => {
                            prop_assert!(fits && slot_free);
                            prop_assert_eq!(address.cell() as usize, top);
                            live.push(Live { address, size, bytes: vec![0; size] });
                        }
                        Err(err) => {
                            prop_assert!(err.is_exhausted(), "unexpected error {err}");
                            prop_assert!(!fits || !slot_free);
                        }
                    }
                }
                Op::Write(i, byte) if !live.is_empty() => {
                    let n = live.len();
                    let entry = &mut live[i % n];
                    let data = vec![byte; entry.size];
                    table.write(&mut surface, entry.address, &data).unwrap();
                    entry.bytes = data;
                }
                Op::Free(i) if !live.is_empty() => {
                    let n = live.len();
                    let entry = live.swap_remove(i % n);
                    table.free(&mut surface, entry.address).unwrap();
                    dead.push(entry.address);
                }
                Op::Write(..) | Op::Free(_) => {}
            }

            let mut ranges: Vec<(usize, usize)> = live
                .iter()
                .map(|l| {
                    let start = l.address.cell() as usize;
                    (start, start + footprint(l.size, integrity))
                })
                .collect();
            ranges.sort_unstable();
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
            }

            for l in &live {
                let mut buf = vec![0u8; l.size];
                table.read(&surface, l.address, &mut buf).unwrap();
                prop_assert_eq!(&buf, &l.bytes);
            }

            let stats = table.stats();
            prop_assert_eq!(stats.allocated, live.iter().map(|l| l.size).sum::<usize>());
            prop_assert_eq!(stats.active_allocations, live.len());
            prop_assert!(stats.fragmentation_percent <= 100.0);

            for address in &dead {
                prop_assert_eq!(
                    table.free(&mut surface, *address),
                    Err(HeapError::NotFound { address: address.to_raw() })
                );
            }
        }
    }
}
