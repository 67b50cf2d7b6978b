/*!
 * Memory Module
 * Memory management and allocation
 */

pub mod manager;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use manager::{
    BlockId, CacheCompactor, CompactionReport, MemoryManager, NoCompression, RunLengthCompressor,
};
pub use traits::*;
pub use types::*;
