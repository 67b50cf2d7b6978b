/*!
 * Workload Test
 * Randomized allocate / free-in-reverse cycle on a plain best-fit heap
 */

use cerebro_kernel::core::limits::HEADER_SIZE;
use cerebro_kernel::{AllocationStrategy, BlockKind, MemoryConfig, MemoryManager};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn test_random_workload_returns_to_single_block() {
    let config = MemoryConfig::with_total(1024 * 1024)
        .without_pools()
        .with_strategy(AllocationStrategy::BestFit);
    let mut manager = MemoryManager::with_config(config).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let mut addresses = Vec::with_capacity(100);
    for _ in 0..100 {
        let size = rng.gen_range(16..=2048);
        let address = manager
            .allocate(size, BlockKind::Application, 8, true)
            .expect("workload fits in 1 MiB");
        addresses.push(address);
    }
    assert_eq!(manager.get_stats().allocation_count, 100);
    manager.verify().unwrap();

    while let Some(address) = addresses.pop() {
        manager.free(address).unwrap();
    }

    let stats = manager.get_stats();
    assert_eq!(stats.used_memory, 0);
    assert_eq!(stats.free_count, 100);
    assert_eq!(stats.heap_blocks, 1);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.largest_free_block, manager.heap().len() - HEADER_SIZE);
    assert_eq!(stats.fragmentation, 0.0);
}

#[test]
fn test_churn_keeps_invariants() {
    let mut manager = MemoryManager::new();
    let mut rng = StdRng::seed_from_u64(42);
    let mut live = Vec::new();

    for round in 0..2000 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let size = rng.gen_range(1..=4096);
            let kind = if rng.gen_bool(0.5) {
                BlockKind::Application
            } else {
                BlockKind::Temporary
            };
            if let Ok(address) = manager.allocate(size, kind, 8, true) {
                live.push(address);
            }
        } else {
            let index = rng.gen_range(0..live.len());
            manager.free(live.swap_remove(index)).unwrap();
        }
        if round % 100 == 0 {
            manager.verify().unwrap();
        }
    }

    for address in live.drain(..) {
        manager.free(address).unwrap();
    }
    assert_eq!(manager.get_stats().used_memory, 0);
    assert_eq!(manager.get_stats().invalid_frees, 0);
    manager.verify().unwrap();
}
