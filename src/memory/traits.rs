/*!
 * Memory Traits
 * Memory management abstractions
 */

use super::types::*;
use crate::core::types::{Address, Size};

/// Memory allocator interface
///
/// The only surface consumers outside the memory subsystem use: they never
/// see block headers.
#[cfg_attr(test, mockall::automock)]
pub trait Allocator {
    /// Allocate memory for a request
    fn allocate(&mut self, request: AllocationRequest) -> MemoryResult<Address>;

    /// Free memory at an address previously returned by `allocate`
    fn free(&mut self, address: Address) -> MemoryResult<()>;

    /// Check if an address lies inside memory managed by this allocator
    fn owns(&self, address: Address) -> bool;

    /// Get the accounted size of a live allocation
    fn block_size(&self, address: Address) -> Option<Size>;
}

/// Memory statistics provider
pub trait MemoryInfo {
    /// Get overall memory statistics
    fn stats(&self) -> MemoryStats;

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure;

    /// Get memory info as (total, used, available)
    fn info(&self) -> (Size, Size, Size) {
        let stats = self.stats();
        (stats.total_memory, stats.used_memory, stats.free_memory)
    }
}

/// Pluggable payload compression used by cache compaction
///
/// `compress` returns `None` when the data cannot be compressed.
/// `decompress` receives the original length so implementations can size
/// their output buffer.
#[cfg_attr(test, mockall::automock)]
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Option<Vec<u8>>;

    fn decompress(&self, data: &[u8], original_len: usize) -> Option<Vec<u8>>;
}
