/*!
 * System Limits and Constants
 *
 * Centralized location for the defaults used by the memory and process
 * subsystems. Every value here can be overridden through configuration
 * except the header geometry, which is fixed by the block layout.
 */

// =============================================================================
// MEMORY LAYOUT
// =============================================================================

/// Default simulated memory size (1MB, the feature-phone RAM budget)
pub const DEFAULT_TOTAL_MEMORY: usize = 1024 * 1024;

/// First address handed out by the simulated address space.
/// Non-zero so that a zero address is never a valid payload.
pub const DEFAULT_BASE_ADDRESS: usize = 0x1000;

/// Bytes occupied by one heap block header
pub const HEADER_SIZE: usize = 32;

/// Allocation grain. Block sizes and header offsets stay multiples of this.
pub const GRAIN: usize = 8;

/// Default alignment for `allocate` callers that do not care
pub const DEFAULT_ALIGNMENT: usize = GRAIN;

/// Smallest payload worth splitting off as its own free block
pub const MIN_BLOCK_SIZE: usize = 16;

/// Heap region alignment (page size)
pub const HEAP_ALIGNMENT: usize = 4096;

/// Largest size `MemoryManager::with_capacity` will lay out.
/// Leaves headroom above the base address so region ends never wrap.
pub const MAX_TOTAL_MEMORY: usize = usize::MAX / 2;

// =============================================================================
// POOL CLASSES
// =============================================================================

/// Number of pool size classes (tiny, small, medium)
pub const POOL_CLASS_COUNT: usize = 3;

pub const TINY_BLOCK_SIZE: usize = 16;
pub const SMALL_BLOCK_SIZE: usize = 64;
pub const MEDIUM_BLOCK_SIZE: usize = 256;

pub const TINY_POOL_CAPACITY: usize = 1024;
pub const SMALL_POOL_CAPACITY: usize = 512;
pub const MEDIUM_POOL_CAPACITY: usize = 256;

// =============================================================================
// RECLAMATION
// =============================================================================

/// Cache blocks below this size are never compressed
pub const COMPRESSION_THRESHOLD: usize = 4096;

/// Fragmentation percentage that triggers an optimize pass after a free
pub const DEFAULT_DEFRAG_THRESHOLD: f64 = 50.0;

/// Usage ratios for pressure classification
pub const PRESSURE_MODERATE_RATIO: f64 = 0.60;
pub const PRESSURE_HIGH_RATIO: f64 = 0.80;
pub const PRESSURE_CRITICAL_RATIO: f64 = 0.95;

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Process table capacity
pub const MAX_PROCESSES: usize = 16;

/// Default stack reservation per process (4KB)
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024;

/// Stack alignment required by the context switch code
pub const STACK_ALIGNMENT: usize = 16;

/// Number of general purpose registers saved per context
pub const SAVED_REGISTERS: usize = 8;
