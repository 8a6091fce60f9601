//! Direct allocations for lines larger than one block
//!
//! These regions bypass the free list entirely: each one is grown from an
//! empty buffer with the fallible reallocation primitive and handed back to
//! the system allocator when released.

use core::fmt;

use super::block::AlignedRegion;
use crate::error::MemoryResult;

/// A one-off region larger than `block_size`
pub struct LargeAllocation {
    region: AlignedRegion,
}

impl LargeAllocation {
    pub(crate) fn allocate(size: usize, alignment: usize) -> MemoryResult<Self> {
        AlignedRegion::allocate(size, alignment).map(|region| Self { region })
    }

    /// Size of the region in bytes
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Whether the region is empty
    pub fn is_empty(&self) -> bool {
        self.region.len() == 0
    }

    /// Alignment of the first byte
    pub fn alignment(&self) -> usize {
        self.region.alignment()
    }

    /// Region contents
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_slice()
    }

    /// Mutable region contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.region.as_mut_slice()
    }
}

impl fmt::Debug for LargeAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeAllocation")
            .field("ptr", &self.as_slice().as_ptr())
            .field("len", &self.len())
            .field("alignment", &self.alignment())
            .finish()
    }
}
