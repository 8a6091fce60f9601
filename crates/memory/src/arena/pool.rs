//! Bounded LIFO free list of reusable blocks
//!
//! The pool only decides where blocks go and keeps the counters honest.
//! Blocks it evicts are handed back to the caller so they can be dropped
//! after the arena lock is released.

use super::{ArenaConfig, ArenaStats, Block};

/// Free list of released blocks, most recently released on top
#[derive(Debug, Default)]
pub(crate) struct BlockPool {
    free: Vec<Block>,
}

impl BlockPool {
    pub(crate) const fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Number of cached blocks
    pub(crate) fn len(&self) -> usize {
        self.free.len()
    }

    /// Pops up to `count` cached blocks, most recently released first
    pub(crate) fn take(&mut self, count: usize, stats: &mut ArenaStats) -> Vec<Block> {
        let reused = count.min(self.free.len());
        let split_at = self.free.len() - reused;
        let mut blocks = self.free.split_off(split_at);
        blocks.reverse();

        stats.record_reused(reused);
        stats.set_cached(self.free.len());
        blocks
    }

    /// Returns a block to the pool
    ///
    /// The block is cached when there is room and its geometry matches the
    /// current configuration; otherwise it is handed back to be freed.
    #[must_use = "a rejected block must be dropped outside the arena lock"]
    pub(crate) fn release(
        &mut self,
        block: Block,
        config: &ArenaConfig,
        stats: &mut ArenaStats,
    ) -> Option<Block> {
        if self.free.len() < config.blocks_max() && block.fits(config) {
            self.free.push(block);
            stats.set_cached(self.free.len());
            None
        } else {
            stats.record_freed(1);
            Some(block)
        }
    }

    /// Trims the pool to at most `keep` blocks, keeping the most recent ones
    #[must_use = "evicted blocks must be dropped outside the arena lock"]
    pub(crate) fn trim(&mut self, keep: usize, stats: &mut ArenaStats) -> Vec<Block> {
        let evict = self.free.len().saturating_sub(keep);
        let evicted: Vec<Block> = self.free.drain(..evict).collect();

        stats.record_freed(evicted.len());
        stats.set_cached(self.free.len());
        evicted
    }
}
