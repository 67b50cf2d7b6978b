/*!
 * CPU Scheduler
 * Round-robin scheduling over the process table
 *
 * The scheduler owns the process table and the simulated CPU register file.
 * Exactly one context is loaded on the CPU at a time: the Running process's.
 * A context switch saves the CPU into the outgoing PCB and loads the
 * incoming PCB's saved context.
 */

use super::table::ProcessTable;
use super::types::{ExecutionContext, ProcessInfo};
use crate::core::types::Pid;
use log::info;

mod operations;
mod stats;

pub use stats::SchedulerStats;

/// Result of one `schedule()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A different process was switched in
    Switched { from: Option<Pid>, to: Pid },
    /// The running process was the only candidate and keeps the CPU
    Continued(Pid),
    /// No process is Ready
    Idle,
}

impl ScheduleOutcome {
    /// Pid now Running, if any
    pub fn running(&self) -> Option<Pid> {
        match *self {
            Self::Switched { to, .. } => Some(to),
            Self::Continued(pid) => Some(pid),
            Self::Idle => None,
        }
    }
}

/// Round-robin CPU scheduler
pub struct Scheduler {
    table: ProcessTable,
    cpu: ExecutionContext,
    /// Last pid dispatched; the next scan starts right after it
    last: Option<Pid>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Scheduler over a table of `capacity` slots
    pub fn new(capacity: usize) -> Self {
        info!("Scheduler initialized: round-robin over {} slots", capacity);
        Self {
            table: ProcessTable::new(capacity),
            cpu: ExecutionContext::default(),
            last: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Pid of the Running process
    pub fn current(&self) -> Option<Pid> {
        self.table.current()
    }

    /// Context currently loaded on the CPU
    pub fn cpu(&self) -> &ExecutionContext {
        &self.cpu
    }

    /// Snapshot of `pid`, reading live registers when it holds the CPU
    pub fn process_info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.table.info(pid).map(|info| self.with_live_context(info))
    }

    /// Snapshots of every live process
    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.table
            .list()
            .into_iter()
            .map(|info| self.with_live_context(info))
            .collect()
    }

    fn with_live_context(&self, mut info: ProcessInfo) -> ProcessInfo {
        // the PCB copy is only refreshed on switch-out
        if self.table.current() == Some(info.pid) {
            info.steps = self.cpu.steps;
        }
        info
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("capacity", &self.table.capacity())
            .field("current", &self.table.current())
            .field("live", &self.table.live_count())
            .field("stats", &self.stats)
            .finish()
    }
}
