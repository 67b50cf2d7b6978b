/*!
 * Memory Pressure Monitor
 * Classifies memory scarcity and decides when reclamation must run
 */

use super::super::types::{MemoryPressure, PowerMode};
use crate::core::config::PressureThresholds;
use crate::core::types::Size;
use log::{info, warn};

#[derive(Debug)]
pub struct PressureMonitor {
    thresholds: PressureThresholds,
    /// Fragmentation percentage above which the level is raised one step
    defrag_threshold: f64,
    power_mode: PowerMode,
    last_level: MemoryPressure,
}

impl PressureMonitor {
    pub fn new(thresholds: PressureThresholds, defrag_threshold: f64) -> Self {
        Self {
            thresholds,
            defrag_threshold,
            power_mode: PowerMode::Normal,
            last_level: MemoryPressure::Low,
        }
    }

    /// Pressure from the usage ratio, escalated when the heap is badly fragmented
    pub fn classify(&self, used: Size, total: Size, fragmentation: f64) -> MemoryPressure {
        let ratio = if total == 0 {
            1.0
        } else {
            used as f64 / total as f64
        };

        let level = if ratio >= self.thresholds.critical {
            MemoryPressure::Critical
        } else if ratio >= self.thresholds.high {
            MemoryPressure::High
        } else if ratio >= self.thresholds.moderate {
            MemoryPressure::Moderate
        } else {
            MemoryPressure::Low
        };

        if fragmentation > self.defrag_threshold && level > MemoryPressure::Low {
            level.escalate()
        } else {
            level
        }
    }

    /// Whether `level` calls for reclamation before allocating
    pub fn requires_action(&self, level: MemoryPressure) -> bool {
        match self.power_mode {
            PowerMode::Normal => level >= MemoryPressure::High,
            PowerMode::Low => level >= MemoryPressure::Moderate,
        }
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        if mode != self.power_mode {
            info!("Memory power mode {:?} -> {:?}", self.power_mode, mode);
        }
        self.power_mode = mode;
    }

    /// Record the latest level, logging transitions
    pub fn observe(&mut self, level: MemoryPressure) {
        if level == self.last_level {
            return;
        }
        if level > self.last_level && level >= MemoryPressure::High {
            warn!("Memory pressure rising: {} -> {}", self.last_level, level);
        } else {
            info!("Memory pressure {} -> {}", self.last_level, level);
        }
        self.last_level = level;
    }

    pub fn last_level(&self) -> MemoryPressure {
        self.last_level
    }
}
