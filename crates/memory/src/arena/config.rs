//! Arena configuration parameters.
//!
//! Every setter validates its input and leaves the configuration untouched
//! on failure. Values only shape allocations made after the change.

use core::fmt;

use crate::error::{MemoryError, MemoryResult};
use crate::utils::{MIB, format_bytes, is_aligned};

/// Validated configuration of a pixel arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArenaConfig {
    /// Alignment of the first byte of every block
    alignment: usize,

    /// Size of every pooled block in bytes
    block_size: usize,

    /// Maximum number of released blocks kept for reuse
    blocks_max: usize,
}

impl ArenaConfig {
    /// Default block alignment
    pub const DEFAULT_ALIGNMENT: usize = 1;

    /// Default block size: 1 MiB
    pub const DEFAULT_BLOCK_SIZE: usize = MIB;

    /// Default cache capacity: nothing is cached
    pub const DEFAULT_BLOCKS_MAX: usize = 0;

    /// Granularity of block sizes
    pub const PAGE_SIZE: usize = 4096;

    /// Alignments accepted by [`ArenaConfig::set_alignment`]
    pub const SUPPORTED_ALIGNMENTS: [usize; 6] = [1, 2, 4, 8, 16, 32];

    /// Largest block size the allocator can serve
    pub const MAX_BLOCK_SIZE: usize = (isize::MAX as usize) & !(Self::PAGE_SIZE - 1);

    /// Creates the default configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            blocks_max: Self::DEFAULT_BLOCKS_MAX,
        }
    }

    /// Returns the block alignment
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns the block size in bytes
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the maximum number of cached blocks
    pub const fn blocks_max(&self) -> usize {
        self.blocks_max
    }

    /// Bytes the cache may hold when full
    pub const fn cache_capacity_bytes(&self) -> usize {
        // cannot overflow: checked by every setter
        self.blocks_max * self.block_size
    }

    /// Sets the block alignment
    ///
    /// Accepts only the values in [`ArenaConfig::SUPPORTED_ALIGNMENTS`].
    pub fn set_alignment(&mut self, alignment: usize) -> MemoryResult<()> {
        Self::validate_alignment(alignment)?;
        self.alignment = alignment;
        Ok(())
    }

    /// Sets the block size
    ///
    /// Accepts positive multiples of [`ArenaConfig::PAGE_SIZE`] for which the
    /// cache capacity `blocks_max * block_size` stays representable.
    pub fn set_block_size(&mut self, block_size: usize) -> MemoryResult<()> {
        Self::validate_block_size(block_size)?;
        Self::validate_capacity(self.blocks_max, block_size)?;
        self.block_size = block_size;
        Ok(())
    }

    /// Sets the maximum number of cached blocks
    pub fn set_blocks_max(&mut self, blocks_max: usize) -> MemoryResult<()> {
        Self::validate_capacity(blocks_max, self.block_size)?;
        self.blocks_max = blocks_max;
        Ok(())
    }

    /// Builder form of [`ArenaConfig::set_alignment`]
    pub fn with_alignment(mut self, alignment: usize) -> MemoryResult<Self> {
        self.set_alignment(alignment)?;
        Ok(self)
    }

    /// Builder form of [`ArenaConfig::set_block_size`]
    pub fn with_block_size(mut self, block_size: usize) -> MemoryResult<Self> {
        self.set_block_size(block_size)?;
        Ok(self)
    }

    /// Builder form of [`ArenaConfig::set_blocks_max`]
    pub fn with_blocks_max(mut self, blocks_max: usize) -> MemoryResult<Self> {
        self.set_blocks_max(blocks_max)?;
        Ok(self)
    }

    /// Checks an alignment against the supported domain
    pub fn validate_alignment(alignment: usize) -> MemoryResult<()> {
        if Self::SUPPORTED_ALIGNMENTS.contains(&alignment) {
            Ok(())
        } else {
            Err(MemoryError::invalid_argument(
                "alignment",
                alignment,
                "must be one of 1, 2, 4, 8, 16 or 32",
            ))
        }
    }

    /// Checks a block size against the supported domain
    pub fn validate_block_size(block_size: usize) -> MemoryResult<()> {
        if block_size == 0 {
            return Err(MemoryError::invalid_argument(
                "block size",
                block_size,
                "must be positive",
            ));
        }
        if !is_aligned(block_size, Self::PAGE_SIZE) {
            return Err(MemoryError::invalid_argument(
                "block size",
                block_size,
                format!("must be a multiple of {}", Self::PAGE_SIZE),
            ));
        }
        if block_size > Self::MAX_BLOCK_SIZE {
            return Err(MemoryError::invalid_argument(
                "block size",
                block_size,
                "exceeds the maximum allocation size",
            ));
        }
        Ok(())
    }

    fn validate_capacity(blocks_max: usize, block_size: usize) -> MemoryResult<()> {
        match blocks_max.checked_mul(block_size) {
            Some(_) => Ok(()),
            None => Err(MemoryError::invalid_argument(
                "blocks max",
                blocks_max,
                format!("{blocks_max} blocks of {block_size} bytes overflow usize"),
            )),
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArenaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alignment={} block_size={} blocks_max={}",
            self.alignment,
            format_bytes(self.block_size),
            self.blocks_max
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArenaConfig::default();
        assert_eq!(config.alignment(), 1);
        assert_eq!(config.block_size(), 1024 * 1024);
        assert_eq!(config.blocks_max(), 0);
        assert_eq!(config.cache_capacity_bytes(), 0);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[case(8)]
    #[case(16)]
    #[case(32)]
    fn test_supported_alignment_round_trips(#[case] alignment: usize) {
        let mut config = ArenaConfig::new();
        config.set_alignment(alignment).unwrap();
        assert_eq!(config.alignment(), alignment);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(15)]
    #[case(64)]
    #[case(usize::MAX)]
    fn test_unsupported_alignment_is_rejected(#[case] alignment: usize) {
        let mut config = ArenaConfig::new().with_alignment(8).unwrap();
        let err = config.set_alignment(alignment).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(config.alignment(), 8);
    }

    #[rstest]
    #[case(4096)]
    #[case(2 * 4096)]
    #[case(3 * 4096)]
    #[case(2 * MIB)]
    fn test_block_size_round_trips(#[case] block_size: usize) {
        let mut config = ArenaConfig::new();
        config.set_block_size(block_size).unwrap();
        assert_eq!(config.block_size(), block_size);
    }

    #[rstest]
    #[case(0)]
    #[case(1024)]
    #[case(4000)]
    #[case(4097)]
    fn test_invalid_block_size_is_rejected(#[case] block_size: usize) {
        let mut config = ArenaConfig::new();
        assert!(config.set_block_size(block_size).is_err());
        assert_eq!(config.block_size(), ArenaConfig::DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_oversized_block_size_is_rejected() {
        let mut config = ArenaConfig::new();
        let too_big = ArenaConfig::MAX_BLOCK_SIZE + ArenaConfig::PAGE_SIZE;
        assert!(config.set_block_size(too_big).is_err());
    }

    #[test]
    fn test_blocks_max_overflow_is_rejected() {
        let mut config = ArenaConfig::new().with_blocks_max(10).unwrap();
        let overflowing = usize::MAX / ArenaConfig::DEFAULT_BLOCK_SIZE + 1;
        let err = config.set_blocks_max(overflowing).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(config.blocks_max(), 10);
        config.set_blocks_max(usize::MAX / ArenaConfig::DEFAULT_BLOCK_SIZE).unwrap();
    }

    #[test]
    fn test_block_size_respects_cached_capacity() {
        let mut config = ArenaConfig::new()
            .with_block_size(ArenaConfig::PAGE_SIZE)
            .unwrap()
            .with_blocks_max(usize::MAX / ArenaConfig::PAGE_SIZE)
            .unwrap();
        assert!(config.set_block_size(2 * ArenaConfig::PAGE_SIZE).is_err());
        assert_eq!(config.block_size(), ArenaConfig::PAGE_SIZE);
    }

    #[test]
    fn test_display() {
        let config = ArenaConfig::new().with_blocks_max(4).unwrap();
        assert_eq!(
            config.to_string(),
            "alignment=1 block_size=1.00 MiB blocks_max=4"
        );
    }
}
