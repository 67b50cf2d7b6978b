/*!
 * Block Directory
 * Address-ordered chain of heap block headers
 *
 * Headers live in an arena and refer to their neighbors by `BlockId`
 * (slot index + generation), never by address. A slot that is released
 * bumps its generation, so a stale id from before a merge is rejected
 * instead of aliasing whatever header reuses the slot.
 *
 * Chain invariants (checked by `verify`):
 * - `prev`/`next` always name the structurally adjacent header
 * - `prev.end() == offset`: payloads never overlap and leave no gaps
 * - the payload index maps exactly the headers in the chain
 */

use super::super::types::{BlockKind, MemoryError, MemoryResult};
use crate::core::limits::{GRAIN, HEADER_SIZE};
use crate::core::types::{Address, Size, Tick};
use std::collections::BTreeMap;

/// Stable handle to a block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

/// Payload owned by a cache-kind block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePayload {
    pub original_size: Size,
    pub compressed_size: Size,
    pub is_compressed: bool,
    /// Raw bytes, or the compressed form when `is_compressed`
    pub data: Vec<u8>,
}

impl CachePayload {
    pub fn raw(data: Vec<u8>) -> Self {
        Self {
            original_size: data.len(),
            compressed_size: 0,
            is_compressed: false,
            data,
        }
    }
}

/// Metadata record preceding a heap region
#[derive(Debug, Clone)]
pub struct BlockHeader {
    /// Address of the header itself; the payload follows it
    pub offset: Address,
    /// Payload bytes, excluding the header
    pub size: Size,
    /// Bytes charged to `used_memory` while the block is live
    pub requested: Size,
    pub kind: BlockKind,
    pub is_free: bool,
    pub can_relocate: bool,
    pub alignment: Size,
    pub access_count: u32,
    pub last_access_tick: Tick,
    pub cache: Option<CachePayload>,
    prev: Option<BlockId>,
    next: Option<BlockId>,
}

impl BlockHeader {
    fn free_region(offset: Address, size: Size) -> Self {
        Self {
            offset,
            size,
            requested: 0,
            kind: BlockKind::Temporary,
            is_free: true,
            can_relocate: true,
            alignment: GRAIN,
            access_count: 0,
            last_access_tick: 0,
            cache: None,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn payload(&self) -> Address {
        self.offset + HEADER_SIZE
    }

    /// First address past the payload
    #[inline]
    pub fn end(&self) -> Address {
        self.payload() + self.size
    }

    pub fn is_compressed(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.is_compressed)
    }

    /// Turn the header back into an anonymous free region
    pub(super) fn release(&mut self) {
        self.is_free = true;
        self.requested = 0;
        self.kind = BlockKind::Temporary;
        self.can_relocate = true;
        self.alignment = GRAIN;
        self.cache = None;
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    header: Option<BlockHeader>,
}

/// Arena-backed, address-ordered block chain
#[derive(Debug, Default)]
pub struct BlockDirectory {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    head: Option<BlockId>,
    tail: Option<BlockId>,
    by_payload: BTreeMap<Address, BlockId>,
    len: usize,
}

impl BlockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding one free block spanning `[start, start + len)`
    pub fn with_region(start: Address, len: Size) -> Self {
        let mut directory = Self::new();
        directory.append(start, len);
        directory
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<BlockId> {
        self.head
    }

    pub fn tail(&self) -> Option<BlockId> {
        self.tail
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockHeader> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.header.as_ref())
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut BlockHeader> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.header.as_mut())
    }

    pub fn next(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(|h| h.next)
    }

    pub fn prev(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(|h| h.prev)
    }

    /// Header whose payload starts exactly at `address`
    pub fn find_by_payload(&self, address: Address) -> Option<BlockId> {
        self.by_payload.get(&address).copied()
    }

    /// Headers in address order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            directory: self,
            cursor: self.head,
        }
    }

    /// Snapshot of ids in address order, for loops that mutate the chain
    pub fn ids(&self) -> Vec<BlockId> {
        self.iter().map(|(id, _)| id).collect()
    }

    fn insert(&mut self, header: BlockHeader) -> BlockId {
        let payload = header.payload();
        let id = match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.header = Some(header);
                BlockId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    header: Some(header),
                });
                BlockId {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_payload.insert(payload, id);
        self.len += 1;
        id
    }

    fn remove(&mut self, id: BlockId) -> Option<BlockHeader> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let header = slot.header.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.by_payload.remove(&header.payload());
        self.len -= 1;
        Some(header)
    }

    /// Append a free region after the current tail, merging with a free tail
    pub fn append(&mut self, start: Address, len: Size) -> BlockId {
        let mut header = BlockHeader::free_region(start, len - HEADER_SIZE);
        header.prev = self.tail;
        let id = self.insert(header);
        match self.tail {
            Some(tail) => {
                if let Some(t) = self.get_mut(tail) {
                    t.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);

        match self.prev(id) {
            Some(prev) if self.get(prev).is_some_and(|h| h.is_free) => {
                self.merge_next(prev);
                prev
            }
            _ => id,
        }
    }

    /// Unlink the last header and return it
    pub fn remove_tail(&mut self) -> Option<BlockHeader> {
        let tail = self.tail?;
        let prev = self.prev(tail);
        let header = self.remove(tail)?;
        match prev {
            Some(p) => {
                if let Some(h) = self.get_mut(p) {
                    h.next = None;
                }
            }
            None => self.head = None,
        }
        self.tail = prev;
        Some(header)
    }

    /// Shrink `id` to `keep` payload bytes and splice a free header for the rest
    ///
    /// The caller guarantees the remainder can hold a header plus a minimum block.
    pub fn split(&mut self, id: BlockId, keep: Size) -> Option<BlockId> {
        let (offset, size, next) = {
            let h = self.get(id)?;
            (h.offset, h.size, h.next)
        };
        if size < keep + HEADER_SIZE {
            return None;
        }

        let rest_offset = offset + HEADER_SIZE + keep;
        let mut rest = BlockHeader::free_region(rest_offset, size - keep - HEADER_SIZE);
        rest.prev = Some(id);
        rest.next = next;
        let rest_id = self.insert(rest);

        if let Some(h) = self.get_mut(id) {
            h.size = keep;
            h.next = Some(rest_id);
        }
        match next {
            Some(n) => {
                if let Some(h) = self.get_mut(n) {
                    h.prev = Some(rest_id);
                }
            }
            None => self.tail = Some(rest_id),
        }
        Some(rest_id)
    }

    /// Absorb the next header into `id` if both are free and adjacent
    pub fn merge_next(&mut self, id: BlockId) -> bool {
        let Some(next) = self.next(id) else {
            return false;
        };
        let mergeable = match (self.get(id), self.get(next)) {
            (Some(a), Some(b)) => a.is_free && b.is_free && a.end() == b.offset,
            _ => false,
        };
        if !mergeable {
            return false;
        }

        let Some(absorbed) = self.remove(next) else {
            return false;
        };
        if let Some(h) = self.get_mut(id) {
            h.size += HEADER_SIZE + absorbed.size;
            h.next = absorbed.next;
        }
        match absorbed.next {
            Some(n) => {
                if let Some(h) = self.get_mut(n) {
                    h.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        true
    }

    /// Merge forward from `id` until the next header is not free; returns merges done
    pub fn coalesce_forward(&mut self, id: BlockId) -> usize {
        let mut merged = 0;
        while self.merge_next(id) {
            merged += 1;
        }
        merged
    }

    /// Check every chain invariant
    pub fn verify(&self) -> MemoryResult<()> {
        let mut count = 0;
        let mut prev: Option<(BlockId, &BlockHeader)> = None;
        for (id, header) in self.iter() {
            if header.prev != prev.map(|(p, _)| p) {
                return Err(MemoryError::CorruptionDetected(header.offset));
            }
            if let Some((_, p)) = prev {
                if p.end() != header.offset {
                    return Err(MemoryError::CorruptionDetected(header.offset));
                }
            }
            if header.size % GRAIN != 0 || header.requested > header.size {
                return Err(MemoryError::CorruptionDetected(header.offset));
            }
            if self.by_payload.get(&header.payload()) != Some(&id) {
                return Err(MemoryError::CorruptionDetected(header.payload()));
            }
            count += 1;
            if count > self.len {
                return Err(MemoryError::CorruptionDetected(header.offset));
            }
            prev = Some((id, header));
        }
        if count != self.len || self.by_payload.len() != self.len || self.tail != prev.map(|(id, _)| id)
        {
            let at = prev.map(|(_, h)| h.offset).unwrap_or_default();
            return Err(MemoryError::CorruptionDetected(at));
        }
        Ok(())
    }

    /// True when no two free headers are structurally adjacent
    pub fn is_fully_coalesced(&self) -> bool {
        let mut previous_free = false;
        for (_, header) in self.iter() {
            if header.is_free && previous_free {
                return false;
            }
            previous_free = header.is_free;
        }
        true
    }
}

/// Address-order iterator over the chain
pub struct Iter<'a> {
    directory: &'a BlockDirectory,
    cursor: Option<BlockId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BlockId, &'a BlockHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let header = self.directory.get(id)?;
        self.cursor = header.next;
        Some((id, header))
    }
}
