/*!
 * Memory Allocator Implementation
 * Allocation and deallocation logic
 */

use super::super::types::{BlockKind, MemoryError, MemoryResult, PoolClassId};
use super::directory::CachePayload;
use super::pool::PoolMiss;
use super::MemoryManager;
use crate::core::limits::{DEFAULT_ALIGNMENT, GRAIN};
use crate::core::types::{align_up, Address, Size};
use log::{debug, error, warn};

/// A validated request, sizes already rounded
#[derive(Debug, Clone, Copy)]
struct Placement {
    accounted: Size,
    kind: BlockKind,
    alignment: Size,
    can_relocate: bool,
}

impl MemoryManager {
    /// Allocate `size` bytes of `kind` memory
    ///
    /// Pool first for small default-kind requests, then the heap. A failed
    /// attempt runs one `optimize()` pass and retries exactly once.
    pub fn allocate(
        &mut self,
        size: Size,
        kind: BlockKind,
        alignment: Size,
        can_relocate: bool,
    ) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::InvalidSize(size));
        }
        if !alignment.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment(alignment));
        }
        if size.checked_add(alignment.max(GRAIN)).is_none() {
            return Err(MemoryError::InvalidSize(size));
        }
        let accounted = align_up(size, alignment);
        let placement = Placement {
            accounted,
            kind,
            alignment,
            can_relocate,
        };

        // System allocations are never delayed by reclamation
        if kind != BlockKind::System {
            let level = self.pressure_level();
            if self.pressure.requires_action(level) {
                self.handle_pressure(level);
            }
        }

        let mut exhausted = None;
        let address = match self.place(placement, &mut exhausted) {
            Some(address) => address,
            None => {
                debug!(
                    "Allocation of {} bytes failed, running optimize before retry",
                    accounted
                );
                self.optimize();
                match self.place(placement, &mut exhausted) {
                    Some(address) => address,
                    None => return Err(self.out_of_memory(size, exhausted)),
                }
            }
        };

        self.counters.used += accounted;
        self.counters.peak = self.counters.peak.max(self.counters.used);
        self.counters.allocations += 1;
        let level = self.pressure_level();
        self.pressure.observe(level);

        debug!(
            "Allocated {} bytes ({:?}, align {}) at 0x{:x}",
            accounted, kind, alignment, address
        );
        self.debug_verify();
        Ok(address)
    }

    /// One placement attempt; a full pool class is skipped on later attempts
    fn place(
        &mut self,
        placement: Placement,
        exhausted: &mut Option<PoolClassId>,
    ) -> Option<Address> {
        let pool_eligible = placement.kind == BlockKind::Application
            && placement.alignment <= DEFAULT_ALIGNMENT
            && self.pools.is_enabled();

        if pool_eligible && exhausted.is_none() {
            match self.pools.allocate(placement.accounted) {
                Ok(address) => return Some(address),
                Err(PoolMiss::Exhausted(class)) => {
                    *exhausted = Some(class);
                    self.counters.pool_exhausted += 1;
                    debug!(
                        "Pool {} exhausted, {} byte request falls back to the heap",
                        class, placement.accounted
                    );
                }
                Err(PoolMiss::NoClass) => {}
            }
        }

        let block_size = align_up(placement.accounted, GRAIN);
        let id = self
            .heap
            .allocate(block_size, placement.alignment, self.config.strategy)?;
        let tick = self.tick;
        let header = self.heap.block_mut(id)?;
        header.kind = placement.kind;
        header.requested = placement.accounted;
        header.can_relocate = placement.can_relocate;
        header.last_access_tick = tick;
        header.cache = (placement.kind == BlockKind::Cache)
            .then(|| CachePayload::raw(vec![0; placement.accounted]));
        Some(header.payload())
    }

    /// Final failure; a full pool class that sent the request to the heap
    /// is reported as the more specific `PoolExhausted`
    fn out_of_memory(&mut self, requested: Size, exhausted: Option<PoolClassId>) -> MemoryError {
        self.counters.out_of_memory += 1;
        let total = self.config.total_memory;
        let used = self.counters.used;
        error!(
            "OOM: requested {} bytes, largest free heap block {} bytes ({} used / {} total)",
            requested,
            self.heap.largest_free(),
            used,
            total
        );
        if let Some(class) = exhausted {
            let pool = self.config.pool_class(class);
            return MemoryError::PoolExhausted {
                class,
                block_size: pool.block_size,
                capacity: pool.capacity,
            };
        }
        MemoryError::OutOfMemory {
            requested,
            available: total.saturating_sub(used),
            used,
            total,
        }
    }

    /// Release the allocation at `address`
    ///
    /// Foreign addresses and double frees are counted, logged and rejected
    /// with `InvalidAddress`; no state changes in that case.
    pub fn free(&mut self, address: Address) -> MemoryResult<()> {
        let mut heap_freed = false;
        let released = if self.pools.owns(address) {
            self.pools.free(address).map(|(class, size)| {
                debug!("Freed {} bytes from pool {} at 0x{:x}", size, class, address);
                size
            })
        } else if self.heap.owns(address) {
            self.heap.free(address).map(|freed| {
                heap_freed = true;
                debug!(
                    "Freed {} bytes ({:?}) at 0x{:x}, merged {} neighbors",
                    freed.requested, freed.kind, address, freed.merged
                );
                freed.requested
            })
        } else {
            None
        };

        let Some(size) = released else {
            self.counters.invalid_frees += 1;
            warn!(
                "Ignoring free of 0x{:x}: not a live allocation ({} invalid frees so far)",
                address, self.counters.invalid_frees
            );
            return Err(MemoryError::InvalidAddress(address));
        };

        self.counters.used -= size;
        self.counters.frees += 1;

        if heap_freed && self.heap.fragmentation_percent() > self.config.defrag_threshold {
            debug!(
                "Fragmentation {:.1}% above {:.1}% after free",
                self.heap.fragmentation_percent(),
                self.config.defrag_threshold
            );
            self.optimize();
        }

        let level = self.pressure_level();
        self.pressure.observe(level);
        self.debug_verify();
        Ok(())
    }
}
