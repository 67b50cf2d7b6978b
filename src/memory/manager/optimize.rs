/*!
 * Memory Optimization
 * Cache compaction, defragmentation, trimming and pressure handling
 */

use super::super::types::{MemoryPressure, OptimizeReport, PowerMode};
use super::compactor::CompactionReport;
use super::MemoryManager;
use crate::core::types::Size;
use log::{debug, info};

impl MemoryManager {
    /// Full reclamation pass: compact cache, defragment, trim
    pub fn optimize(&mut self) -> OptimizeReport {
        let compaction = self.compact_cache();
        let merged_blocks = self.defragment();
        let trimmed_bytes = self.trim_unused();
        self.counters.optimize_runs += 1;

        let report = OptimizeReport {
            compacted_blocks: compaction.compacted,
            bytes_reclaimed: compaction.bytes_reclaimed,
            merged_blocks,
            trimmed_bytes,
        };
        if report == OptimizeReport::default() {
            debug!("Optimize pass #{} found nothing to reclaim", self.counters.optimize_runs);
        } else {
            info!(
                "Optimize pass #{}: compacted {} cache blocks ({} bytes), merged {} blocks, trimmed {} bytes",
                self.counters.optimize_runs,
                report.compacted_blocks,
                report.bytes_reclaimed,
                report.merged_blocks,
                report.trimmed_bytes
            );
        }
        self.debug_verify();
        report
    }

    /// Compress cold cache payloads; no-op when compression is disabled
    pub fn compact_cache(&mut self) -> CompactionReport {
        if !self.config.enable_compression {
            return CompactionReport::default();
        }
        let report = self
            .compactor
            .compact(&mut self.heap, self.compressor.as_ref());
        self.counters.used -= report.accounted_released;
        self.counters.bytes_compressed_away += report.bytes_reclaimed;
        if report.compacted > 0 {
            debug!(
                "Compacted {} cache blocks, {} bytes back on the heap",
                report.compacted, report.bytes_reclaimed
            );
        }
        report
    }

    /// Exhaustive merge of adjacent free blocks; live blocks never move
    pub fn defragment(&mut self) -> usize {
        let merged = self.heap.coalesce_all();
        if merged > 0 {
            debug!("Defragmentation merged {} free blocks", merged);
        }
        merged
    }

    /// Hand trailing free heap space back when trimming is enabled
    pub fn trim_unused(&mut self) -> Size {
        if !self.config.allow_trim {
            return 0;
        }
        self.heap.trim()
    }

    /// Reclaim ahead of an allocation according to `level`
    pub fn handle_pressure(&mut self, level: MemoryPressure) {
        debug!("Handling {} memory pressure", level);
        match level {
            MemoryPressure::Critical => {
                self.optimize();
            }
            MemoryPressure::High => {
                self.compact_cache();
                self.defragment();
            }
            MemoryPressure::Moderate if self.power_mode() == PowerMode::Low => {
                self.compact_cache();
            }
            _ => {}
        }
    }
}
