/*!
 * Accounting Property Tests
 * used_memory always equals the sum of live allocation sizes
 */

use cerebro_kernel::core::align_up;
use cerebro_kernel::{BlockKind, MemoryManager};
use proptest::prelude::*;

const KINDS: [BlockKind; 4] = [
    BlockKind::System,
    BlockKind::Application,
    BlockKind::Cache,
    BlockKind::Temporary,
];

#[derive(Debug, Clone)]
enum Op {
    Alloc { size: usize, kind: usize, align_shift: u32 },
    Free { index: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..3000, 0usize..KINDS.len(), 0u32..7)
            .prop_map(|(size, kind, align_shift)| Op::Alloc { size, kind, align_shift }),
        2 => any::<usize>().prop_map(|index| Op::Free { index }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_used_memory_matches_live_allocations(
        ops in prop::collection::vec(op_strategy(), 1..200)
    ) {
        let mut manager = MemoryManager::with_capacity(256 * 1024);
        let mut live: Vec<(usize, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc { size, kind, align_shift } => {
                    let alignment = 1usize << align_shift;
                    if let Ok(address) = manager.allocate(size, KINDS[kind], alignment, true) {
                        prop_assert_eq!(address % alignment, 0);
                        live.push((address, align_up(size, alignment)));
                    }
                }
                Op::Free { index } => {
                    if live.is_empty() {
                        continue;
                    }
                    let (address, _) = live.swap_remove(index % live.len());
                    prop_assert!(manager.free(address).is_ok());
                }
            }

            let expected: usize = live.iter().map(|(_, size)| size).sum();
            prop_assert_eq!(manager.get_stats().used_memory, expected);
        }

        prop_assert!(manager.verify().is_ok());
        for (address, size) in &live {
            prop_assert_eq!(manager.allocation_size(*address), Some(*size));
        }
    }

    #[test]
    fn prop_live_allocations_never_overlap(
        sizes in prop::collection::vec(1usize..4096, 1..64)
    ) {
        let mut manager = MemoryManager::new();
        let mut spans: Vec<(usize, usize)> = sizes
            .into_iter()
            .filter_map(|size| {
                manager
                    .allocate(size, BlockKind::Temporary, 8, true)
                    .ok()
                    .map(|address| (address, address + size))
            })
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0, "{:x?} overlaps {:x?}", pair[0], pair[1]);
        }
    }
}
