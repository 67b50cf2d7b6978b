/*!
 * Memory Types
 * Common types for memory management
 */

use crate::core::types::{Address, Size, Tick};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Out of memory: requested {requested} bytes, available {available} bytes ({used} used / {total} total)")]
    OutOfMemory {
        requested: usize,
        available: usize,
        used: usize,
        total: usize,
    },

    #[error("Pool {class} exhausted: all {capacity} slots of {block_size} bytes in use")]
    PoolExhausted {
        class: PoolClassId,
        block_size: usize,
        capacity: usize,
    },

    #[error("Invalid memory address: 0x{0:x}")]
    InvalidAddress(Address),

    #[error("Invalid allocation size: {0}")]
    InvalidSize(Size),

    #[error("Invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),

    #[error("Memory corruption detected at 0x{0:x}")]
    CorruptionDetected(Address),

    #[error("Address 0x{0:x} is not a live cache block")]
    NotCacheBlock(Address),

    #[error("Cache block at 0x{0:x} could not be decompressed")]
    CompressionFailed(Address),
}

impl MemoryError {
    /// True for the resource-exhaustion cases a caller may recover from by freeing memory
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. } | Self::PoolExhausted { .. })
    }
}

/// What a block of memory is used for. Drives reclamation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Kernel-critical memory, never delayed by reclamation
    System,
    /// Ordinary application memory
    #[default]
    Application,
    /// Reclaimable cache memory, candidate for compression
    Cache,
    /// Short-lived scratch memory
    Temporary,
}

/// Heap search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// First free block large enough
    FirstFit,
    /// Free block with the smallest leftover
    #[default]
    BestFit,
}

impl AllocationStrategy {
    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first_fit" | "firstfit" | "first" => Some(Self::FirstFit),
            "best_fit" | "bestfit" | "best" => Some(Self::BestFit),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFit => "first_fit",
            Self::BestFit => "best_fit",
        }
    }
}

/// Power efficiency mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    #[default]
    Normal,
    /// Reclaim earlier: moderate pressure is handled like high pressure
    Low,
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Moderate,
    High,
    Critical,
}

impl MemoryPressure {
    /// One level up, never promoting into `Critical` (which stays `Critical`)
    pub(crate) fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Moderate,
            Self::Moderate | Self::High => Self::High,
            Self::Critical => Self::Critical,
        }
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Moderate => write!(f, "MODERATE"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Pool size class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolClassId {
    Tiny,
    Small,
    Medium,
}

impl PoolClassId {
    pub const ALL: [PoolClassId; 3] = [Self::Tiny, Self::Small, Self::Medium];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Tiny => 0,
            Self::Small => 1,
            Self::Medium => 2,
        }
    }
}

impl std::fmt::Display for PoolClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PoolClassId::Tiny => write!(f, "tiny"),
            PoolClassId::Small => write!(f, "small"),
            PoolClassId::Medium => write!(f, "medium"),
        }
    }
}

/// Memory allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    pub size: Size,
    pub kind: BlockKind,
    pub alignment: Size,
    pub can_relocate: bool,
}

impl AllocationRequest {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            kind: BlockKind::default(),
            alignment: crate::core::limits::DEFAULT_ALIGNMENT,
            can_relocate: true,
        }
    }

    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Pin the block: it may never be moved once handed out
    pub fn pinned(mut self) -> Self {
        self.can_relocate = false;
        self
    }
}

/// Per-pool usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUsage {
    pub block_size: usize,
    pub capacity: usize,
    pub used_slots: usize,
    /// Bytes of slots in use (`used_slots * block_size`)
    pub used_bytes: usize,
    /// Requests that matched this class while it was full
    pub exhausted: u64,
}

/// Memory statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memory: usize,
    /// Sum of live allocation sizes (rounded to their alignment)
    pub used_memory: usize,
    pub free_memory: usize,
    pub peak_usage: usize,
    pub usage_percentage: f64,
    pub allocation_count: u64,
    pub free_count: u64,
    pub pool_usage: [PoolUsage; 3],
    /// Total pool overflows that fell back to the heap
    pub pool_exhausted: u64,
    /// `100 * (1 - largest_free / total_free)` over the heap
    pub fragmentation: f64,
    pub heap_blocks: usize,
    pub free_blocks: usize,
    pub largest_free_block: usize,
    pub cache_memory: usize,
    pub temp_memory: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub compressed_blocks: usize,
    pub bytes_compressed_away: usize,
    pub invalid_frees: u64,
    pub optimize_runs: u64,
    pub out_of_memory: u64,
}

/// Read-only view of one heap block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub address: Address,
    pub size: Size,
    pub kind: BlockKind,
    pub is_free: bool,
    pub can_relocate: bool,
    pub alignment: Size,
    pub access_count: u32,
    pub last_access_tick: Tick,
    pub is_compressed: bool,
}

/// Outcome of one `optimize()` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub compacted_blocks: usize,
    pub bytes_reclaimed: usize,
    pub merged_blocks: usize,
    pub trimmed_bytes: usize,
}
