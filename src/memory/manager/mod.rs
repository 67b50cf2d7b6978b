/*!
 * Memory Management
 *
 * Tiered allocator for a 1MB-class device with pressure-driven reclamation.
 *
 * ## Layout
 *
 * ```text
 * base ─┬─ tiny pool   (16B slots)
 *       ├─ small pool  (64B slots)
 *       ├─ medium pool (256B slots)
 *       └─ heap        (header-prefixed blocks, address ordered)
 * ```
 *
 * ## Allocation path
 *
 * - Round the size up to the requested alignment
 * - Non-System requests consult the pressure monitor and reclaim first on
 *   high pressure; System requests are never delayed
 * - Default-kind small requests try the pool class, everything else (and pool
 *   overflow) goes to the heap with the configured fit strategy
 * - On failure run one full `optimize()` pass and retry exactly once
 *
 * ## Features
 *
 * - **Coalescing**: every heap free merges with free neighbors immediately
 * - **Cache compaction**: cold cache payloads are compressed in place and the
 *   tail is returned to the heap
 * - **Defragmentation**: exhaustive merge sweep, triggered by fragmentation
 * - **Trim**: trailing free space can be released and is re-reserved on demand
 */

mod allocator;
mod cache;
mod compactor;
mod directory;
mod heap;
mod optimize;
mod pool;
mod pressure;

pub use compactor::{CacheCompactor, CompactionReport, NoCompression, RunLengthCompressor};
pub use directory::{BlockDirectory, BlockHeader, BlockId, CachePayload};
pub use heap::{FreedBlock, HeapAllocator};
pub use pool::{PoolAllocator, PoolMiss};
pub use pressure::PressureMonitor;

use super::traits::{Allocator, Compressor, MemoryInfo};
use super::types::*;
use crate::core::config::MemoryConfig;
use crate::core::errors::ConfigError;
use crate::core::limits::{GRAIN, HEADER_SIZE, HEAP_ALIGNMENT, MAX_TOTAL_MEMORY, MIN_BLOCK_SIZE};
use crate::core::types::{align_up, Address, Size, Tick};
use log::info;

/// Running counters that are not derivable from the allocators themselves
#[derive(Debug, Default)]
pub(super) struct Counters {
    pub used: Size,
    pub peak: Size,
    pub allocations: u64,
    pub frees: u64,
    pub pool_exhausted: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub invalid_frees: u64,
    pub optimize_runs: u64,
    pub out_of_memory: u64,
    pub bytes_compressed_away: Size,
}

/// Memory manager
///
/// Single-owner kernel object: every operation takes `&mut self` and runs to
/// completion. Hosts with real threads wrap the whole manager in one lock.
pub struct MemoryManager {
    config: MemoryConfig,
    pools: PoolAllocator,
    heap: HeapAllocator,
    pressure: PressureMonitor,
    compactor: CacheCompactor,
    compressor: Box<dyn Compressor>,
    counters: Counters,
    tick: Tick,
}

impl MemoryManager {
    /// Memory manager with the default 1MB configuration
    pub fn new() -> Self {
        // the default configuration always validates
        Self::build(MemoryConfig::default())
    }

    /// Create memory manager with custom capacity and default pools
    ///
    /// Pools are dropped automatically when they would not leave room for a heap.
    /// `total` is clamped to `HEADER_SIZE + MIN_BLOCK_SIZE..=MAX_TOTAL_MEMORY`.
    pub fn with_capacity(total: Size) -> Self {
        let total = total.clamp(HEADER_SIZE + MIN_BLOCK_SIZE, MAX_TOTAL_MEMORY);
        let mut config = MemoryConfig::with_total(total);
        if config.validate().is_err() {
            config.pools_enabled = false;
        }
        Self::build(config)
    }

    /// Create memory manager from a validated configuration
    pub fn with_config(config: MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Swap in a compression implementation for cache compaction
    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    fn build(config: MemoryConfig) -> Self {
        let base = align_up(config.base_address.max(GRAIN), HEAP_ALIGNMENT);
        let pools = if config.pools_enabled {
            PoolAllocator::new(base, &config.pools)
        } else {
            PoolAllocator::disabled(base)
        };
        let heap_start = align_up(pools.end(), HEAP_ALIGNMENT);
        let heap_len = (config.total_memory - config.pool_reserve()) & !(GRAIN - 1);
        let heap = HeapAllocator::new(heap_start, heap_len, config.min_block_size);

        info!(
            "Memory manager initialized with {} bytes: pools {} ({} bytes), heap {} bytes at 0x{:x}, strategy {}, compression {}",
            config.total_memory,
            if pools.is_enabled() { "on" } else { "off" },
            config.pool_reserve(),
            heap_len,
            heap_start,
            config.strategy.as_str(),
            if config.enable_compression { "on" } else { "off" },
        );

        let mut manager = Self {
            pressure: PressureMonitor::new(config.pressure, config.defrag_threshold),
            compactor: CacheCompactor::new(config.compression_threshold),
            compressor: Box::new(NoCompression),
            counters: Counters::default(),
            tick: 0,
            pools,
            heap,
            config,
        };

        if manager.config.system_reserve > 0 {
            let reserve = manager.config.system_reserve;
            match manager.allocate(reserve, BlockKind::System, GRAIN, false) {
                Ok(address) => info!("Reserved {} bytes of system memory at 0x{:x}", reserve, address),
                Err(e) => log::error!("System reserve of {} bytes failed: {}", reserve, e),
            }
        }
        manager
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn heap(&self) -> &HeapAllocator {
        &self.heap
    }

    pub fn pools(&self) -> &PoolAllocator {
        &self.pools
    }

    /// Current logical tick
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Advance the logical clock used for access tracking
    pub fn advance_tick(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }

    pub fn power_mode(&self) -> PowerMode {
        self.pressure.power_mode()
    }

    /// Switch power mode; entering low power runs one optimize pass
    pub fn set_power_mode(&mut self, mode: PowerMode) {
        let entering_low = mode == PowerMode::Low && self.pressure.power_mode() != PowerMode::Low;
        self.pressure.set_power_mode(mode);
        if entering_low {
            self.optimize();
        }
    }

    /// Whether `address` lies in a pool or heap region owned by this manager
    pub fn owns(&self, address: Address) -> bool {
        self.pools.owns(address) || self.heap.owns(address)
    }

    /// Accounted size of the live allocation at `address`
    pub fn allocation_size(&self, address: Address) -> Option<Size> {
        if self.pools.owns(address) {
            return self.pools.allocation_size(address);
        }
        self.heap
            .live_block(address)
            .and_then(|id| self.heap.block(id))
            .map(|h| h.requested)
    }

    /// Metadata of the live heap block at `address`
    pub fn block_info(&self, address: Address) -> Option<BlockInfo> {
        let id = self.heap.live_block(address)?;
        let h = self.heap.block(id)?;
        Some(BlockInfo {
            address: h.payload(),
            size: h.size,
            kind: h.kind,
            is_free: h.is_free,
            can_relocate: h.can_relocate,
            alignment: h.alignment,
            access_count: h.access_count,
            last_access_tick: h.last_access_tick,
            is_compressed: h.is_compressed(),
        })
    }

    /// Record an access to the heap block at `address`
    pub fn touch(&mut self, address: Address) -> bool {
        let tick = self.tick;
        let Some(id) = self.heap.live_block(address) else {
            return false;
        };
        match self.heap.block_mut(id) {
            Some(h) => {
                h.access_count = h.access_count.saturating_add(1);
                h.last_access_tick = tick;
                true
            }
            None => false,
        }
    }

    /// Current pressure classification
    pub fn pressure_level(&self) -> MemoryPressure {
        self.pressure.classify(
            self.counters.used,
            self.config.total_memory,
            self.heap.fragmentation_percent(),
        )
    }

    /// Aggregate counters snapshot
    pub fn get_stats(&self) -> MemoryStats {
        let total = self.config.total_memory;
        let used = self.counters.used;
        let directory = self.heap.directory();
        MemoryStats {
            total_memory: total,
            used_memory: used,
            free_memory: total.saturating_sub(used),
            peak_usage: self.counters.peak,
            usage_percentage: if total == 0 {
                0.0
            } else {
                used as f64 / total as f64 * 100.0
            },
            allocation_count: self.counters.allocations,
            free_count: self.counters.frees,
            pool_usage: self.pools.usage(),
            pool_exhausted: self.counters.pool_exhausted,
            fragmentation: self.heap.fragmentation_percent(),
            heap_blocks: directory.len(),
            free_blocks: self.heap.free_block_count(),
            largest_free_block: self.heap.largest_free(),
            cache_memory: self.heap.bytes_of_kind(BlockKind::Cache),
            temp_memory: self.heap.bytes_of_kind(BlockKind::Temporary),
            cache_hits: self.counters.cache_hits,
            cache_misses: self.counters.cache_misses,
            compressed_blocks: directory
                .iter()
                .filter(|(_, h)| !h.is_free && h.is_compressed())
                .count(),
            bytes_compressed_away: self.counters.bytes_compressed_away,
            invalid_frees: self.counters.invalid_frees,
            optimize_runs: self.counters.optimize_runs,
            out_of_memory: self.counters.out_of_memory,
        }
    }

    /// Check chain, bitmap and accounting invariants
    pub fn verify(&self) -> MemoryResult<()> {
        self.heap.directory().verify()?;
        self.pools.verify().map_err(MemoryError::CorruptionDetected)?;
        let accounted = self.heap.accounted_bytes() + self.pools.accounted_bytes();
        if accounted != self.counters.used {
            log::error!(
                "Accounting mismatch: counters say {} bytes used, blocks hold {}",
                self.counters.used,
                accounted
            );
            return Err(MemoryError::CorruptionDetected(self.heap.start()));
        }
        Ok(())
    }

    /// Development-build invariant check after every mutating operation
    #[inline]
    fn debug_verify(&self) {
        debug_assert!(
            self.verify().is_ok(),
            "memory invariants violated: {:?}",
            self.verify()
        );
    }

    /// Log every heap header at debug level
    pub fn dump_chain(&self) {
        log::debug!(
            "Heap chain: {} blocks, {} free bytes, fragmentation {:.1}%",
            self.heap.directory().len(),
            self.heap.free_bytes(),
            self.heap.fragmentation_percent()
        );
        for (_, h) in self.heap.directory().iter() {
            log::debug!(
                "  0x{:08x} size={:<8} kind={:?} free={} relocatable={} align={} accesses={} last={} compressed={}",
                h.payload(),
                h.size,
                h.kind,
                h.is_free,
                h.can_relocate,
                h.alignment,
                h.access_count,
                h.last_access_tick,
                h.is_compressed()
            );
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("total_memory", &self.config.total_memory)
            .field("used", &self.counters.used)
            .field("heap_blocks", &self.heap.directory().len())
            .field("tick", &self.tick)
            .finish()
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

// Implement trait interfaces
impl Allocator for MemoryManager {
    fn allocate(&mut self, request: AllocationRequest) -> MemoryResult<Address> {
        MemoryManager::allocate(
            self,
            request.size,
            request.kind,
            request.alignment,
            request.can_relocate,
        )
    }

    fn free(&mut self, address: Address) -> MemoryResult<()> {
        MemoryManager::free(self, address)
    }

    fn owns(&self, address: Address) -> bool {
        MemoryManager::owns(self, address)
    }

    fn block_size(&self, address: Address) -> Option<Size> {
        self.allocation_size(address)
    }
}

impl MemoryInfo for MemoryManager {
    fn stats(&self) -> MemoryStats {
        self.get_stats()
    }

    fn pressure(&self) -> MemoryPressure {
        self.pressure_level()
    }
}
