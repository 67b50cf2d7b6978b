/*!
 * Cache Memory
 * Reclaimable cache blocks with transparent decompression
 */

use super::super::types::{BlockKind, MemoryError, MemoryResult};
use super::directory::{BlockId, CachePayload};
use super::MemoryManager;
use crate::core::limits::DEFAULT_ALIGNMENT;
use crate::core::types::{Address, Size};
use log::debug;

impl MemoryManager {
    /// Store `data` in a new cache block
    pub fn cache_alloc(&mut self, data: &[u8]) -> MemoryResult<Address> {
        let address = self.allocate(data.len(), BlockKind::Cache, DEFAULT_ALIGNMENT, true)?;
        if let Some(header) = self
            .heap
            .live_block(address)
            .and_then(|id| self.heap.block_mut(id))
        {
            header.cache = Some(CachePayload::raw(data.to_vec()));
        }
        Ok(address)
    }

    fn cache_block(&self, address: Address) -> Option<BlockId> {
        self.heap
            .live_block(address)
            .filter(|&id| self.heap.block(id).is_some_and(|h| h.kind == BlockKind::Cache))
    }

    /// Read a cache block, decompressing on demand
    ///
    /// Counts a hit and touches the block, or a miss when `address` is not a
    /// live cache block.
    pub fn cache_read(&mut self, address: Address) -> MemoryResult<Vec<u8>> {
        let Some(id) = self.cache_block(address) else {
            self.counters.cache_misses += 1;
            return Err(MemoryError::NotCacheBlock(address));
        };

        let tick = self.tick;
        let header = self
            .heap
            .block_mut(id)
            .ok_or(MemoryError::CorruptionDetected(address))?;
        header.access_count = header.access_count.saturating_add(1);
        header.last_access_tick = tick;
        let payload = header
            .cache
            .as_ref()
            .ok_or(MemoryError::CorruptionDetected(address))?;

        let data = if payload.is_compressed {
            self.compressor
                .decompress(&payload.data, payload.original_size)
                .ok_or(MemoryError::CompressionFailed(address))?
        } else {
            payload.data.clone()
        };
        self.counters.cache_hits += 1;
        Ok(data)
    }

    /// Free a cache block; other block kinds are rejected
    pub fn cache_free(&mut self, address: Address) -> MemoryResult<()> {
        if self.cache_block(address).is_none() {
            return Err(MemoryError::NotCacheBlock(address));
        }
        self.free(address)
    }

    /// Free every cache block, returning the accounted bytes released
    pub fn cache_clear(&mut self) -> Size {
        let blocks: Vec<(Address, Size)> = self
            .heap
            .directory()
            .iter()
            .filter(|(_, h)| !h.is_free && h.kind == BlockKind::Cache)
            .map(|(_, h)| (h.payload(), h.requested))
            .collect();

        let mut released = 0;
        for (address, size) in blocks {
            if self.free(address).is_ok() {
                released += size;
            }
        }
        debug!("Cache cleared: {} bytes released", released);
        released
    }
}
