/*!
 * Scheduler Statistics
 * Track and report scheduler activity
 */

use super::Scheduler;
use serde::{Deserialize, Serialize};

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub schedule_calls: u64,
    /// Switches to a different process
    pub context_switches: u64,
    /// `schedule()` calls that found nothing Ready
    pub idle_ticks: u64,
    /// Times any process was switched onto the CPU
    pub dispatches: u64,
    pub created: u64,
    pub terminated: u64,
    /// Steps executed across all processes
    pub steps: u64,
}

impl Scheduler {
    /// Get scheduler statistics snapshot
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
