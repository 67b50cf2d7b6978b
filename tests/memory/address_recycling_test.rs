/*!
 * Address Recycling Test
 * Verifies that freed heap addresses are handed out again
 */

use cerebro_kernel::{BlockKind, MemoryManager};

#[test]
fn test_address_recycling() {
    let mut manager = MemoryManager::new();

    // Larger than the medium pool class, so all three land on the heap
    let addr1 = manager
        .allocate(1024, BlockKind::Application, 8, true)
        .expect("Failed to allocate block 1");
    let addr2 = manager
        .allocate(2048, BlockKind::Application, 8, true)
        .expect("Failed to allocate block 2");
    let addr3 = manager
        .allocate(512, BlockKind::Application, 8, true)
        .expect("Failed to allocate block 3");

    println!("Initial allocations:");
    println!("  addr1: 0x{:x} (1024 bytes)", addr1);
    println!("  addr2: 0x{:x} (2048 bytes)", addr2);
    println!("  addr3: 0x{:x} (512 bytes)", addr3);

    assert!(addr2 > addr1, "Second address should be after first");
    assert!(addr3 > addr2, "Third address should be after second");

    manager.free(addr2).expect("Failed to free block 2");
    println!("\nFreed addr2 (2048 bytes at 0x{:x})", addr2);

    // Best fit prefers the 2048 byte hole over the untouched tail
    let addr4 = manager
        .allocate(1024, BlockKind::Application, 8, true)
        .expect("Failed to allocate block 4");
    assert_eq!(
        addr4, addr2,
        "Address should be recycled from freed block (best-fit)"
    );

    // The split remainder of the hole is now the best fit
    let addr5 = manager
        .allocate(512, BlockKind::Application, 8, true)
        .expect("Failed to allocate block 5");
    assert_eq!(addr5, addr2 + 1024 + 32);
    assert!(addr5 < addr3);

    manager.verify().expect("Heap invariants violated");
    println!("✓ Address recycling verified");
}

#[test]
fn test_freed_address_is_not_live() {
    let mut manager = MemoryManager::new();
    let addr = manager
        .allocate(4096, BlockKind::Temporary, 8, true)
        .expect("allocation failed");
    assert_eq!(manager.allocation_size(addr), Some(4096));

    manager.free(addr).expect("free failed");
    assert_eq!(manager.allocation_size(addr), None);
    assert!(manager.free(addr).is_err(), "double free must be rejected");
    assert_eq!(manager.get_stats().invalid_frees, 1);
}
