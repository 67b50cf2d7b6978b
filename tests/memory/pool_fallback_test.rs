/*!
 * Pool Fallback Test
 * Exhausted pool classes fall back to the heap and are counted
 */

use cerebro_kernel::{BlockKind, MemoryConfig, MemoryManager};
use pretty_assertions::assert_eq;

#[test]
fn test_exhausted_tiny_pool_falls_back_to_heap() {
    let mut manager = MemoryManager::with_config(MemoryConfig::default()).unwrap();
    let capacity = manager.config().pools[0].capacity;

    let pooled: Vec<_> = (0..capacity)
        .map(|_| manager.allocate(16, BlockKind::Application, 8, true).unwrap())
        .collect();
    assert!(pooled.iter().all(|a| manager.pools().owns(*a)));
    assert_eq!(manager.get_stats().pool_exhausted, 0);

    let overflow = manager.allocate(16, BlockKind::Application, 8, true).unwrap();
    assert!(manager.heap().owns(overflow));
    assert_eq!(manager.get_stats().pool_exhausted, 1);

    // Each overflowing request is counted once
    manager.allocate(16, BlockKind::Application, 8, true).unwrap();
    assert_eq!(manager.get_stats().pool_exhausted, 2);

    // A released slot is reused before the heap
    manager.free(pooled[7]).unwrap();
    let again = manager.allocate(10, BlockKind::Application, 8, true).unwrap();
    assert_eq!(again, pooled[7]);
    assert_eq!(manager.get_stats().pool_exhausted, 2);
    manager.verify().unwrap();
}

#[test]
fn test_only_application_requests_use_pools() {
    let mut manager = MemoryManager::new();
    for kind in [BlockKind::System, BlockKind::Cache, BlockKind::Temporary] {
        let address = manager.allocate(32, kind, 8, true).unwrap();
        assert!(manager.heap().owns(address), "{:?} should be heap backed", kind);
    }
    let address = manager.allocate(32, BlockKind::Application, 8, true).unwrap();
    assert!(manager.pools().owns(address));
    // accounted at the requested size, while the slot itself is 64 bytes
    assert_eq!(manager.allocation_size(address), Some(32));
    let usage = manager.get_stats().pool_usage[1];
    assert_eq!(usage.used_slots, 1);
    assert_eq!(usage.used_bytes, 64);
}
