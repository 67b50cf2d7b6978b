/*!
 * Heap Allocator
 * First-fit / best-fit allocation over the block chain
 *
 * The heap covers `[start, limit)`. Only `[start, reserved_end)` is backed by
 * headers; `trim` hands trailing free space back and the next request that
 * cannot be met grows the reservation again.
 */

use super::super::types::{AllocationStrategy, BlockKind};
use super::directory::{BlockDirectory, BlockHeader, BlockId};
use crate::core::limits::HEADER_SIZE;
use crate::core::types::{align_up, Address, Size};
use log::debug;

/// What a successful `free` released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreedBlock {
    pub size: Size,
    pub requested: Size,
    pub kind: BlockKind,
    /// Headers absorbed while coalescing
    pub merged: usize,
}

#[derive(Debug)]
pub struct HeapAllocator {
    directory: BlockDirectory,
    start: Address,
    limit: Address,
    reserved_end: Address,
    min_block_size: Size,
}

impl HeapAllocator {
    /// Heap over `[start, start + len)` starting as one free block
    pub fn new(start: Address, len: Size, min_block_size: Size) -> Self {
        debug!(
            "Heap initialized at 0x{:x} with {} bytes (header {} bytes, min block {} bytes)",
            start, len, HEADER_SIZE, min_block_size
        );
        Self {
            directory: BlockDirectory::with_region(start, len),
            start,
            limit: start + len,
            reserved_end: start + len,
            min_block_size,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn len(&self) -> Size {
        self.limit - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Whether `address` falls inside the heap region
    pub fn owns(&self, address: Address) -> bool {
        address >= self.start && address < self.limit
    }

    pub fn directory(&self) -> &BlockDirectory {
        &self.directory
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockHeader> {
        self.directory.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BlockHeader> {
        self.directory.get_mut(id)
    }

    /// Live (non-free) block whose payload starts at `address`
    pub fn live_block(&self, address: Address) -> Option<BlockId> {
        self.directory
            .find_by_payload(address)
            .filter(|&id| self.directory.get(id).is_some_and(|h| !h.is_free))
    }

    /// Claim a free block of at least `size` payload bytes
    ///
    /// `size` must already be on the allocation grain. Alignments above the
    /// grain are met by splitting a free pad off the front of the block.
    pub fn allocate(
        &mut self,
        size: Size,
        alignment: Size,
        strategy: AllocationStrategy,
    ) -> Option<BlockId> {
        let (mut id, lead) = match self.find(size, alignment, strategy) {
            Some(found) => found,
            None => {
                if !self.grow() {
                    return None;
                }
                self.find(size, alignment, strategy)?
            }
        };
        if lead > 0 {
            // the pad keeps the original header and stays free
            id = self.directory.split(id, lead)?;
        }

        self.try_split(id, size);
        let header = self.directory.get_mut(id)?;
        header.is_free = false;
        header.alignment = alignment;
        header.access_count = 0;
        header.last_access_tick = 0;
        Some(id)
    }

    /// Front pad needed to align the payload of `header`, and the leftover
    /// after placing `size` bytes
    fn fit(&self, header: &BlockHeader, size: Size, alignment: Size) -> Option<(Size, Size)> {
        let payload = header.payload();
        let lead = if payload % alignment == 0 {
            0
        } else {
            // the pad must be a valid free block of its own
            align_up(payload + HEADER_SIZE + self.min_block_size, alignment) - HEADER_SIZE - payload
        };
        let needed = if lead == 0 { size } else { lead + HEADER_SIZE + size };
        header.size.checked_sub(needed).map(|leftover| (lead, leftover))
    }

    fn find(
        &self,
        size: Size,
        alignment: Size,
        strategy: AllocationStrategy,
    ) -> Option<(BlockId, Size)> {
        let mut candidates = self
            .directory
            .iter()
            .filter(|(_, h)| h.is_free)
            .filter_map(|(id, h)| self.fit(h, size, alignment).map(|fit| (id, fit)));

        match strategy {
            AllocationStrategy::FirstFit => candidates.next().map(|(id, (lead, _))| (id, lead)),
            AllocationStrategy::BestFit => {
                let mut best: Option<(BlockId, Size, Size)> = None;
                for (id, (lead, leftover)) in candidates {
                    // strict comparison keeps the first block in address order on ties
                    if best.map_or(true, |(_, _, min)| leftover < min) {
                        best = Some((id, lead, leftover));
                        if leftover == 0 {
                            break;
                        }
                    }
                }
                best.map(|(id, lead, _)| (id, lead))
            }
        }
    }

    /// Split `id` down to `keep` bytes when the leftover is worth a header
    pub fn try_split(&mut self, id: BlockId, keep: Size) -> Option<BlockId> {
        let size = self.directory.get(id)?.size;
        if size.checked_sub(keep)? > HEADER_SIZE + self.min_block_size {
            self.directory.split(id, keep)
        } else {
            None
        }
    }

    /// Mark the block at `address` free and coalesce it with free neighbors
    ///
    /// Returns `None` for addresses that are not the payload of a live block
    /// (foreign pointers and double frees) without touching the chain.
    pub fn free(&mut self, address: Address) -> Option<FreedBlock> {
        let id = self.live_block(address)?;
        let header = self.directory.get_mut(id)?;
        let freed = FreedBlock {
            size: header.size,
            requested: header.requested,
            kind: header.kind,
            merged: 0,
        };
        header.release();

        let merged = self.coalesce_around(id);
        Some(FreedBlock { merged, ..freed })
    }

    /// Merge a free block with a free predecessor and all free successors
    pub fn coalesce_around(&mut self, id: BlockId) -> usize {
        let start = match self.directory.prev(id) {
            Some(prev) if self.directory.get(prev).is_some_and(|h| h.is_free) => prev,
            _ => id,
        };
        self.directory.coalesce_forward(start)
    }

    /// Exhaustive sweep merging every run of adjacent free blocks
    pub fn coalesce_all(&mut self) -> usize {
        let mut merged = 0;
        let mut cursor = self.directory.head();
        while let Some(id) = cursor {
            if self.directory.get(id).is_some_and(|h| h.is_free) {
                merged += self.directory.coalesce_forward(id);
            }
            cursor = self.directory.next(id);
        }
        merged
    }

    /// Release a trailing free block; returns the bytes handed back
    pub fn trim(&mut self) -> Size {
        let tail_is_free = self
            .directory
            .tail()
            .and_then(|id| self.directory.get(id))
            .is_some_and(|h| h.is_free);
        if !tail_is_free {
            return 0;
        }
        match self.directory.remove_tail() {
            Some(header) => {
                let released = self.reserved_end - header.offset;
                self.reserved_end = header.offset;
                debug!(
                    "Trimmed {} bytes at 0x{:x} from the heap reservation",
                    released, header.offset
                );
                released
            }
            None => 0,
        }
    }

    /// Re-reserve space released by `trim`
    fn grow(&mut self) -> bool {
        let available = self.limit - self.reserved_end;
        if available < HEADER_SIZE + self.min_block_size {
            return false;
        }
        debug!(
            "Growing heap reservation by {} bytes at 0x{:x}",
            available, self.reserved_end
        );
        self.directory.append(self.reserved_end, available);
        self.reserved_end = self.limit;
        true
    }

    /// Bytes currently handed back to the platform
    pub fn unreserved(&self) -> Size {
        self.limit - self.reserved_end
    }

    pub fn free_bytes(&self) -> Size {
        self.directory
            .iter()
            .filter(|(_, h)| h.is_free)
            .map(|(_, h)| h.size)
            .sum()
    }

    pub fn largest_free(&self) -> Size {
        self.directory
            .iter()
            .filter(|(_, h)| h.is_free)
            .map(|(_, h)| h.size)
            .max()
            .unwrap_or(0)
    }

    pub fn free_block_count(&self) -> usize {
        self.directory.iter().filter(|(_, h)| h.is_free).count()
    }

    /// `100 * (1 - largest_free / total_free)`; 0 when nothing is free
    pub fn fragmentation_percent(&self) -> f64 {
        let total = self.free_bytes();
        if total == 0 {
            return 0.0;
        }
        100.0 * (1.0 - self.largest_free() as f64 / total as f64)
    }

    /// Sum of accounted sizes of all live blocks
    pub fn accounted_bytes(&self) -> Size {
        self.directory
            .iter()
            .filter(|(_, h)| !h.is_free)
            .map(|(_, h)| h.requested)
            .sum()
    }

    /// Accounted bytes of live blocks of `kind`
    pub fn bytes_of_kind(&self, kind: BlockKind) -> Size {
        self.directory
            .iter()
            .filter(|(_, h)| !h.is_free && h.kind == kind)
            .map(|(_, h)| h.requested)
            .sum()
    }
}
