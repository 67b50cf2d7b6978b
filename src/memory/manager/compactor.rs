/*!
 * Cache Compactor
 * Reclaims heap space by compressing cold cache payloads in place
 *
 * A compressed block keeps its address; its declared size shrinks to the
 * compressed size and the freed tail becomes a new free header, spliced in
 * exactly like a heap split. Blocks that would not shrink enough to hold a
 * header for the tail are left untouched, which makes compaction idempotent.
 */

use super::super::traits::Compressor;
use super::super::types::BlockKind;
use super::directory::BlockId;
use super::heap::HeapAllocator;
use crate::core::limits::GRAIN;
use crate::core::types::{align_up, Size};
use log::debug;

/// Compressor that never shrinks anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, _data: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn decompress(&self, _data: &[u8], _original_len: usize) -> Option<Vec<u8>> {
        None
    }
}

/// Byte run-length encoding as `(run, byte)` pairs
///
/// Cheap enough for a phone-class CPU and very effective on the zero-filled
/// and repetitive buffers caches tend to hold.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunLengthCompressor;

impl Compressor for RunLengthCompressor {
    fn compress(&self, data: &[u8]) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() / 2);
        let mut iter = data.iter().copied().peekable();
        while let Some(byte) = iter.next() {
            let mut run: u8 = 1;
            while run < u8::MAX && iter.peek() == Some(&byte) {
                iter.next();
                run += 1;
            }
            out.push(run);
            out.push(byte);
            if out.len() >= data.len() {
                return None;
            }
        }
        Some(out)
    }

    fn decompress(&self, data: &[u8], original_len: usize) -> Option<Vec<u8>> {
        if data.len() % 2 != 0 {
            return None;
        }
        let mut out = Vec::with_capacity(original_len);
        for pair in data.chunks_exact(2) {
            out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        (out.len() == original_len).then_some(out)
    }
}

/// Totals for one compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub compacted: usize,
    /// Payload bytes returned to the free chain
    pub bytes_reclaimed: Size,
    /// Reduction of the bytes charged to `used_memory`
    pub accounted_released: Size,
}

#[derive(Debug)]
pub struct CacheCompactor {
    threshold: Size,
}

impl CacheCompactor {
    pub fn new(threshold: Size) -> Self {
        Self { threshold }
    }

    fn is_candidate(&self, heap: &HeapAllocator, id: BlockId) -> bool {
        heap.block(id).is_some_and(|h| {
            !h.is_free
                && h.kind == BlockKind::Cache
                && h.size >= self.threshold
                && h.cache.as_ref().is_some_and(|c| !c.is_compressed)
        })
    }

    /// Compress every eligible cache block
    pub fn compact(&self, heap: &mut HeapAllocator, compressor: &dyn Compressor) -> CompactionReport {
        let candidates: Vec<BlockId> = heap
            .directory()
            .ids()
            .into_iter()
            .filter(|&id| self.is_candidate(heap, id))
            .collect();

        let mut report = CompactionReport::default();
        for id in candidates {
            if let Some((reclaimed, released)) = self.compact_block(heap, id, compressor) {
                report.compacted += 1;
                report.bytes_reclaimed += reclaimed;
                report.accounted_released += released;
            }
        }
        report
    }

    /// Compress one block; `None` leaves it exactly as it was
    pub fn compact_block(
        &self,
        heap: &mut HeapAllocator,
        id: BlockId,
        compressor: &dyn Compressor,
    ) -> Option<(Size, Size)> {
        if !self.is_candidate(heap, id) {
            return None;
        }
        let header = heap.block(id)?;
        let (old_size, alignment, payload) = (header.size, header.alignment, header.cache.as_ref()?);

        let compressed = compressor.compress(&payload.data)?;
        if compressed.len() >= payload.original_size {
            debug!(
                "Cache block at 0x{:x} is incompressible ({} -> {} bytes)",
                header.payload(),
                payload.original_size,
                compressed.len()
            );
            return None;
        }

        let accounted = align_up(compressed.len().max(1), alignment);
        let new_size = align_up(accounted, GRAIN);
        // fails when the tail could not hold a free header
        let tail = heap.try_split(id, new_size)?;
        heap.coalesce_around(tail);

        let header = heap.block_mut(id)?;
        let released = header.requested.saturating_sub(accounted);
        header.requested = accounted;
        let address = header.payload();
        let cache = header.cache.as_mut()?;
        debug!(
            "Compressed cache block at 0x{:x}: {} -> {} bytes",
            address,
            cache.original_size,
            compressed.len()
        );
        cache.compressed_size = compressed.len();
        cache.is_compressed = true;
        cache.data = compressed;

        Some((old_size - new_size, released))
    }
}
