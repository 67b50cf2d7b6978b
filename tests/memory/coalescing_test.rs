/*!
 * Coalescing Test
 * Adjacent free heap blocks merge into one region
 */

use cerebro_kernel::core::limits::HEADER_SIZE;
use cerebro_kernel::{BlockKind, MemoryConfig, MemoryManager};
use pretty_assertions::assert_eq;

fn heap_only() -> MemoryManager {
    MemoryManager::with_config(MemoryConfig::first_fit_only(64 * 1024)).expect("valid config")
}

fn free_block_size(manager: &MemoryManager, address: usize) -> usize {
    let directory = manager.heap().directory();
    let id = directory
        .find_by_payload(address)
        .expect("address should start a block");
    let header = directory.get(id).expect("block exists");
    assert!(header.is_free);
    header.size
}

#[test]
fn test_free_middle_then_left_merges() {
    let mut manager = heap_only();
    let (size_a, size_b, size_c) = (256, 512, 128);

    let a = manager.allocate(size_a, BlockKind::Application, 8, true).unwrap();
    let b = manager.allocate(size_b, BlockKind::Application, 8, true).unwrap();
    let _c = manager.allocate(size_c, BlockKind::Application, 8, true).unwrap();
    assert_eq!(b, a + size_a + HEADER_SIZE);

    manager.free(b).unwrap();
    manager.free(a).unwrap();

    // Region bytes = header + payload; the merged region holds both blocks
    // and both of their headers
    let merged = free_block_size(&manager, a);
    assert!(HEADER_SIZE + merged >= size_a + size_b + 2 * HEADER_SIZE);
    assert!(manager.heap().directory().find_by_payload(b).is_none());
    assert!(manager.heap().directory().is_fully_coalesced());

    let fragmentation_before = manager.get_stats().fragmentation;
    let joined = manager
        .allocate(size_a + size_b, BlockKind::Application, 8, true)
        .unwrap();
    assert_eq!(joined, a);
    assert!(manager.get_stats().fragmentation <= fragmentation_before);
    manager.verify().unwrap();
}

#[test]
fn test_free_everything_leaves_one_block() {
    let mut manager = heap_only();
    let addresses: Vec<_> = (1..=10)
        .map(|i| {
            manager
                .allocate(i * 100, BlockKind::Application, 8, true)
                .unwrap()
        })
        .collect();

    // Free in an interleaved order so merges happen in both directions
    for address in addresses.iter().step_by(2) {
        manager.free(*address).unwrap();
    }
    for address in addresses.iter().skip(1).step_by(2) {
        manager.free(*address).unwrap();
    }

    let stats = manager.get_stats();
    assert_eq!(stats.used_memory, 0);
    assert_eq!(stats.heap_blocks, 1);
    assert_eq!(stats.largest_free_block, manager.heap().len() - HEADER_SIZE);
}
