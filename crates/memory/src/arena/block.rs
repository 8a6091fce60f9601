//! Fixed-size pooled blocks and the aligned storage behind them
//!
//! Storage is over-allocated by `alignment - 1` bytes and the usable window
//! starts at the first aligned address inside it. The heap buffer never
//! moves while the region is alive, so the offset stays valid.

use core::fmt;

use super::ArenaConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::padding_needed;

/// Owned, aligned, initialized byte region
pub(crate) struct AlignedRegion {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
    alignment: usize,
}

impl AlignedRegion {
    /// Obtains a fresh zeroed region from the system allocator
    ///
    /// Allocation failure is reported as [`MemoryError::OutOfMemory`]
    /// instead of aborting the process.
    pub(crate) fn allocate(len: usize, alignment: usize) -> MemoryResult<Self> {
        debug_assert!(alignment.is_power_of_two());

        let padded = len
            .checked_add(alignment - 1)
            .ok_or_else(|| MemoryError::size_overflow("aligned region"))?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(padded)
            .map_err(|_| MemoryError::out_of_memory(len, alignment))?;
        storage.resize(padded, 0);

        let offset = padding_needed(storage.as_ptr() as usize, alignment);
        debug_assert!(offset + len <= storage.len());

        Ok(Self {
            storage,
            offset,
            len,
            alignment,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn alignment(&self) -> usize {
        self.alignment
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }
}

/// A pooled region of exactly `block_size` bytes aligned to `alignment`
///
/// A block is owned either by a live [`PixelBuffer`](super::PixelBuffer)
/// or by the arena's free list; it returns to the operating system when it
/// is evicted or rejected by a full cache.
pub struct Block {
    region: AlignedRegion,
}

impl Block {
    /// Allocates a fresh block for the given configuration
    pub(crate) fn allocate(config: &ArenaConfig) -> MemoryResult<Self> {
        AlignedRegion::allocate(config.block_size(), config.alignment()).map(|region| Self { region })
    }

    /// Size of the block in bytes
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Always false: blocks have a positive size
    pub fn is_empty(&self) -> bool {
        self.region.len() == 0
    }

    /// Alignment the block was created with
    pub fn alignment(&self) -> usize {
        self.region.alignment()
    }

    /// Address of the first usable byte
    pub fn as_ptr(&self) -> *const u8 {
        self.region.as_slice().as_ptr()
    }

    /// Block contents
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_slice()
    }

    /// Mutable block contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.region.as_mut_slice()
    }

    /// Whether the block has the geometry new allocations under `config` need
    pub(crate) fn fits(&self, config: &ArenaConfig) -> bool {
        self.len() == config.block_size() && self.alignment() == config.alignment()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .field("alignment", &self.alignment())
            .finish()
    }
}
