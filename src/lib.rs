/*!
 * Cerebro Kernel Library
 * Memory and process core of a feature-phone operating system
 */

pub mod core;
pub mod kernel;
pub mod memory;
pub mod monitoring;
pub mod process;

// Re-exports
pub use crate::core::{
    ConfigError, KernelConfig, KernelError, KernelResult, MemoryConfig, ProcessConfig,
};
pub use kernel::{Kernel, SharedKernel, TimerHandle};
pub use memory::{
    AllocationStrategy, Allocator, BlockKind, Compressor, MemoryError, MemoryManager,
    MemoryPressure, MemoryStats, NoCompression, PowerMode, RunLengthCompressor,
};
pub use monitoring::init_tracing;
pub use process::{
    ExecutionContext, ProcessEntry, ProcessError, ProcessState, ScheduleOutcome, Scheduler,
    StepOutcome,
};
