/*!
 * Cache Compaction Test
 * Compressing cold cache blocks returns space and keeps data readable
 */

use cerebro_kernel::{MemoryConfig, MemoryManager, RunLengthCompressor};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, RngCore, SeedableRng};

fn compressing_manager() -> MemoryManager {
    MemoryManager::with_config(MemoryConfig::with_total(512 * 1024).without_pools())
        .expect("valid config")
        .with_compressor(Box::new(RunLengthCompressor))
}

#[test]
fn test_compaction_reclaims_and_preserves_data() {
    let mut manager = compressing_manager();
    let pattern: Vec<u8> = (0..16 * 1024).map(|i| (i / 1024) as u8).collect();
    let address = manager.cache_alloc(&pattern).unwrap();
    let used_before = manager.get_stats().used_memory;
    let free_before = manager.heap().free_bytes();

    let report = manager.optimize();
    assert_eq!(report.compacted_blocks, 1);
    assert!(report.bytes_reclaimed > 0);

    let stats = manager.get_stats();
    assert!(stats.used_memory < used_before);
    assert_eq!(stats.compressed_blocks, 1);
    assert!(manager.heap().free_bytes() > free_before);
    assert!(manager.block_info(address).unwrap().is_compressed);

    assert_eq!(manager.cache_read(address).unwrap(), pattern);
    manager.verify().unwrap();
}

#[test]
fn test_compaction_is_idempotent() {
    let mut manager = compressing_manager();
    for _ in 0..4 {
        manager.cache_alloc(&[0u8; 8192]).unwrap();
    }

    let first = manager.compact_cache();
    assert_eq!(first.compacted, 4);
    let stats = manager.get_stats();

    let second = manager.compact_cache();
    assert_eq!(second.compacted, 0);
    assert_eq!(second.bytes_reclaimed, 0);
    assert_eq!(manager.get_stats().used_memory, stats.used_memory);
    assert_eq!(manager.get_stats().heap_blocks, stats.heap_blocks);
}

#[test]
fn test_incompressible_and_small_blocks_untouched() {
    let mut manager = compressing_manager();
    let mut noise = vec![0u8; 8192];
    StdRng::seed_from_u64(7).fill_bytes(&mut noise);
    let random = manager.cache_alloc(&noise).unwrap();
    // Below the compression threshold
    let small = manager.cache_alloc(&[1u8; 512]).unwrap();

    let report = manager.compact_cache();
    assert_eq!(report.compacted, 0);
    assert!(!manager.block_info(random).unwrap().is_compressed);
    assert!(!manager.block_info(small).unwrap().is_compressed);
    assert_eq!(manager.cache_read(random).unwrap(), noise);
}

#[test]
fn test_freeing_compressed_block_releases_remaining_charge() {
    let mut manager = compressing_manager();
    let address = manager.cache_alloc(&[9u8; 32 * 1024]).unwrap();
    manager.compact_cache();
    assert!(manager.get_stats().used_memory > 0);

    manager.cache_free(address).unwrap();
    assert_eq!(manager.get_stats().used_memory, 0);
    assert_eq!(manager.get_stats().heap_blocks, 1);
    manager.verify().unwrap();
}
