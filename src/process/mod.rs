/*!
 * Process Module
 * Process table, entry points and round-robin scheduling
 */

pub mod scheduler;
pub mod table;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use scheduler::{ScheduleOutcome, Scheduler, SchedulerStats};
pub use table::{ProcessControlBlock, ProcessTable, StackBlock};
pub use traits::{IdleLoop, Named, ProcessEntry};
pub use types::*;
