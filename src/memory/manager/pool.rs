/*!
 * Pool Allocator
 * Fixed-size slot pools for small, high-frequency allocations
 *
 * Each class owns a contiguous region of `capacity * block_size` bytes and a
 * bitmap with one bit per slot. Classes are laid out back to back starting
 * at the configured base address, so the owning class of an address is a
 * pure range computation.
 */

use super::super::types::{PoolClassId, PoolUsage};
use crate::core::config::PoolClassConfig;
use crate::core::limits::GRAIN;
use crate::core::types::{align_up, Address, Size};
use log::debug;

const WORD_BITS: usize = u64::BITS as usize;

/// Why a request was not served from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMiss {
    /// No class is large enough (or pools are disabled)
    NoClass,
    /// The matching class has no free slot
    Exhausted(PoolClassId),
}

/// One fixed-size class
#[derive(Debug)]
pub struct PoolClass {
    id: PoolClassId,
    block_size: Size,
    capacity: usize,
    base: Address,
    bitmap: Vec<u64>,
    used_count: usize,
    /// Accounted size of the allocation in each slot
    requested: Vec<Size>,
    exhausted: u64,
}

impl PoolClass {
    fn new(id: PoolClassId, base: Address, config: PoolClassConfig) -> Self {
        Self {
            id,
            block_size: config.block_size,
            capacity: config.capacity,
            base,
            bitmap: vec![0; config.capacity.div_ceil(WORD_BITS)],
            used_count: 0,
            requested: vec![0; config.capacity],
            exhausted: 0,
        }
    }

    #[inline]
    fn end(&self) -> Address {
        self.base + self.block_size * self.capacity
    }

    #[inline]
    fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.end()
    }

    /// Bits of word `w` that correspond to real slots
    #[inline]
    fn valid_mask(&self, w: usize) -> u64 {
        let remaining = self.capacity - w * WORD_BITS;
        if remaining >= WORD_BITS {
            u64::MAX
        } else {
            (1u64 << remaining) - 1
        }
    }

    fn first_clear(&self) -> Option<usize> {
        self.bitmap.iter().enumerate().find_map(|(w, word)| {
            let clear = !word & self.valid_mask(w);
            (clear != 0).then(|| w * WORD_BITS + clear.trailing_zeros() as usize)
        })
    }

    #[inline]
    fn is_set(&self, slot: usize) -> bool {
        self.bitmap[slot / WORD_BITS] & (1u64 << (slot % WORD_BITS)) != 0
    }

    #[inline]
    fn set(&mut self, slot: usize) {
        self.bitmap[slot / WORD_BITS] |= 1u64 << (slot % WORD_BITS);
    }

    #[inline]
    fn clear(&mut self, slot: usize) {
        self.bitmap[slot / WORD_BITS] &= !(1u64 << (slot % WORD_BITS));
    }

    fn popcount(&self) -> usize {
        self.bitmap.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            block_size: self.block_size,
            capacity: self.capacity,
            used_slots: self.used_count,
            used_bytes: self.used_count * self.block_size,
            exhausted: self.exhausted,
        }
    }
}

/// Tiny/small/medium slot pools
#[derive(Debug, Default)]
pub struct PoolAllocator {
    classes: Vec<PoolClass>,
    start: Address,
    end: Address,
}

impl PoolAllocator {
    /// Lay the classes out from `base`; configs must be in ascending block size
    pub fn new(base: Address, configs: &[PoolClassConfig; 3]) -> Self {
        let mut classes = Vec::with_capacity(configs.len());
        let mut cursor = align_up(base, GRAIN);
        for (id, config) in PoolClassId::ALL.into_iter().zip(configs.iter()) {
            let class = PoolClass::new(id, cursor, *config);
            cursor = class.end();
            classes.push(class);
        }
        debug!(
            "Pool allocator laid out at 0x{:x}..0x{:x} ({} classes)",
            base,
            cursor,
            classes.len()
        );
        Self {
            classes,
            start: base,
            end: cursor,
        }
    }

    /// Pool allocator that owns nothing (pools disabled)
    pub fn disabled(base: Address) -> Self {
        Self {
            classes: Vec::new(),
            start: base,
            end: base,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.classes.is_empty()
    }

    /// First address past the pool regions
    pub fn end(&self) -> Address {
        self.end
    }

    /// Whether `address` falls inside any pool's reserved region
    pub fn owns(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }

    /// Smallest class whose block size fits `size`
    pub fn class_for(&self, size: Size) -> Option<PoolClassId> {
        self.classes
            .iter()
            .find(|c| c.block_size >= size)
            .map(|c| c.id)
    }

    /// Take the first free slot of the smallest fitting class
    pub fn allocate(&mut self, size: Size) -> Result<Address, PoolMiss> {
        let Some(class) = self.classes.iter_mut().find(|c| c.block_size >= size) else {
            return Err(PoolMiss::NoClass);
        };
        let Some(slot) = class.first_clear() else {
            class.exhausted += 1;
            return Err(PoolMiss::Exhausted(class.id));
        };

        class.set(slot);
        class.used_count += 1;
        class.requested[slot] = size;
        Ok(class.base + slot * class.block_size)
    }

    /// Release the slot at `address`, returning its class and accounted size
    ///
    /// Foreign, misaligned and already-free addresses are rejected before any
    /// bitmap is touched.
    pub fn free(&mut self, address: Address) -> Option<(PoolClassId, Size)> {
        let class = self.classes.iter_mut().find(|c| c.contains(address))?;
        let offset = address - class.base;
        if offset % class.block_size != 0 {
            return None;
        }
        let slot = offset / class.block_size;
        if !class.is_set(slot) {
            return None;
        }

        class.clear(slot);
        class.used_count -= 1;
        let size = std::mem::take(&mut class.requested[slot]);
        Some((class.id, size))
    }

    /// Accounted size of a live slot allocation
    pub fn allocation_size(&self, address: Address) -> Option<Size> {
        let class = self.classes.iter().find(|c| c.contains(address))?;
        let offset = address - class.base;
        let slot = offset / class.block_size;
        (offset % class.block_size == 0 && class.is_set(slot)).then(|| class.requested[slot])
    }

    pub fn usage(&self) -> [PoolUsage; 3] {
        let mut usage = [PoolUsage::default(); 3];
        for class in &self.classes {
            usage[class.id.index()] = class.usage();
        }
        usage
    }

    /// Sum of accounted sizes of all live slots
    pub fn accounted_bytes(&self) -> Size {
        self.classes
            .iter()
            .map(|c| {
                (0..c.capacity)
                    .filter(|&slot| c.is_set(slot))
                    .map(|slot| c.requested[slot])
                    .sum::<Size>()
            })
            .sum()
    }

    /// `used_count == popcount(bitmap)` for every class
    pub fn verify(&self) -> Result<(), Address> {
        match self.classes.iter().find(|c| c.used_count != c.popcount()) {
            Some(class) => Err(class.base),
            None => Ok(()),
        }
    }
}
