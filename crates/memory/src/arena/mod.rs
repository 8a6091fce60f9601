//! Process-wide block arena for pixel buffers
//!
//! # Architecture
//!
//! ```text
//! Arena
//! └── Mutex<ArenaState>
//!     ├── ArenaConfig  (alignment, block_size, blocks_max)
//!     ├── BlockPool    (LIFO free list, len <= blocks_max)
//!     └── ArenaStats   (six counters)
//! ```
//!
//! A request whose lines fit in one block is served from the pool: cached
//! blocks first, fresh blocks from the system allocator for the rest. A
//! request whose lines are larger than a block takes the large-allocation
//! path and never touches the cache.
//!
//! Only bookkeeping happens under the lock. Fresh memory is obtained and
//! evicted memory is dropped after the lock is released.

mod block;
mod buffer;
pub mod config;
mod large;
mod pool;
mod stats;

use core::alloc::Layout;
use core::fmt;
use std::sync::OnceLock;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

pub use block::Block;
pub use buffer::PixelBuffer;
pub use config::ArenaConfig;
pub use large::LargeAllocation;
pub use stats::ArenaStats;

use buffer::Storage;
use pool::BlockPool;

use crate::env::{ENV_PREFIX, EnvLoader, EnvReport};
use crate::error::{MemoryError, MemoryResult};

static GLOBAL_ARENA: OnceLock<Arena> = OnceLock::new();

/// Reserves room for `additional` request parts without aborting on failure
fn reserve_parts<T>(parts: &mut Vec<T>, additional: usize) -> MemoryResult<()> {
    parts.try_reserve_exact(additional).map_err(|_| {
        Layout::array::<T>(additional).map_or_else(
            |_| MemoryError::out_of_memory(usize::MAX, align_of::<T>()),
            MemoryError::out_of_memory_with_layout,
        )
    })
}

struct ArenaState {
    config: ArenaConfig,
    pool: BlockPool,
    stats: ArenaStats,
}

impl ArenaState {
    /// Drops every cached block from the pool, returning them for release
    fn flush(&mut self) -> Vec<Block> {
        self.pool.trim(0, &mut self.stats)
    }
}

/// Block arena serving pixel buffer allocations
///
/// All methods take `&self`; the arena can be shared freely between
/// threads. Use [`Arena::global`] for the process-wide instance or build
/// private arenas with [`Arena::new`] / [`Arena::with_config`].
pub struct Arena {
    state: Mutex<ArenaState>,
}

impl Arena {
    /// Creates an arena with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::new())
    }

    /// Creates an arena with the given configuration
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            state: Mutex::new(ArenaState {
                config,
                pool: BlockPool::new(),
                stats: ArenaStats::new(),
            }),
        }
    }

    /// Returns the process-wide arena
    ///
    /// Built on first use with the default configuration, then adjusted by
    /// the `IMAGING_ALIGNMENT`, `IMAGING_BLOCK_SIZE` and `IMAGING_BLOCKS_MAX`
    /// environment variables. Invalid variables are logged and skipped.
    pub fn global() -> &'static Self {
        GLOBAL_ARENA.get_or_init(|| {
            let arena = Self::new();
            let report = EnvLoader::with_prefix(ENV_PREFIX).apply_process_env(&arena);
            debug!(
                config = %arena.config(),
                applied = report.applied.len(),
                warnings = report.warnings.len(),
                "Initialized global pixel arena"
            );
            arena
        })
    }

    /// Returns the global arena if it has been initialized
    pub fn try_global() -> Option<&'static Self> {
        GLOBAL_ARENA.get()
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        self.state.lock()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Current configuration
    pub fn config(&self) -> ArenaConfig {
        self.lock().config
    }

    /// Current block alignment
    pub fn alignment(&self) -> usize {
        self.lock().config.alignment()
    }

    /// Current block size in bytes
    pub fn block_size(&self) -> usize {
        self.lock().config.block_size()
    }

    /// Current cache capacity in blocks
    pub fn blocks_max(&self) -> usize {
        self.lock().config.blocks_max()
    }

    /// Sets the alignment of blocks allocated from now on
    ///
    /// Cached blocks with the previous alignment are freed.
    pub fn set_alignment(&self, alignment: usize) -> MemoryResult<()> {
        let evicted = {
            let mut state = self.lock();
            let previous = state.config.alignment();
            state.config.set_alignment(alignment)?;
            if previous == alignment {
                return Ok(());
            }
            state.flush()
        };
        debug!(alignment, evicted = evicted.len(), "Arena alignment changed");
        Ok(())
    }

    /// Sets the size of blocks allocated from now on
    ///
    /// Cached blocks of the previous size are freed.
    pub fn set_block_size(&self, block_size: usize) -> MemoryResult<()> {
        let evicted = {
            let mut state = self.lock();
            let previous = state.config.block_size();
            state.config.set_block_size(block_size)?;
            if previous == block_size {
                return Ok(());
            }
            state.flush()
        };
        debug!(block_size, evicted = evicted.len(), "Arena block size changed");
        Ok(())
    }

    /// Sets the cache capacity, trimming the cache if it holds more
    pub fn set_blocks_max(&self, blocks_max: usize) -> MemoryResult<()> {
        let evicted = {
            let mut state = self.lock();
            state.config.set_blocks_max(blocks_max)?;
            let ArenaState { pool, stats, .. } = &mut *state;
            pool.trim(blocks_max, stats)
        };
        debug!(blocks_max, evicted = evicted.len(), "Arena cache capacity changed");
        Ok(())
    }

    /// Applies configuration from environment-style variables
    ///
    /// Never fails: problems are reported as warnings in the returned
    /// [`EnvReport`] and logged. See [`EnvLoader`] for the accepted names.
    pub fn apply_env_variables<I, K, V>(&self, vars: I) -> EnvReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        EnvLoader::new().apply(self, vars)
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocates `size` contiguous bytes as a single-line buffer
    ///
    /// Requests up to `block_size` take one pooled block; larger ones
    /// take the large-allocation path.
    pub fn allocate(&self, size: usize) -> MemoryResult<PixelBuffer<'_>> {
        self.allocate_lines(size, 1)
    }

    /// Allocates a buffer of `lines` lines of `line_size` bytes each
    ///
    /// Counts as one request in [`ArenaStats::new_count`]. When a line fits
    /// in a block, `block_size / line_size` lines share each block and the
    /// blocks come from the cache before the system allocator is asked.
    /// When a line is larger than a block, every line is a separate
    /// [`LargeAllocation`].
    pub fn allocate_lines(&self, line_size: usize, lines: usize) -> MemoryResult<PixelBuffer<'_>> {
        line_size
            .checked_mul(lines)
            .ok_or_else(|| MemoryError::size_overflow("pixel buffer layout"))?;

        if line_size == 0 || lines == 0 {
            self.lock().stats.record_request();
            return Ok(PixelBuffer::new(self, Storage::Empty, line_size, lines, 1));
        }

        let (config, mut blocks, needed) = {
            let mut state = self.lock();
            let config = state.config;
            if line_size > config.block_size() {
                drop(state);
                return self.allocate_large(&config, line_size, lines);
            }

            let lines_per_block = config.block_size() / line_size;
            let needed = lines.div_ceil(lines_per_block);
            let ArenaState { pool, stats, .. } = &mut *state;
            (config, pool.take(needed, stats), needed)
        };

        let reused = blocks.len();
        if let Err(err) = reserve_parts(&mut blocks, needed - reused) {
            self.release_blocks(blocks);
            return Err(err);
        }
        while blocks.len() < needed {
            match Block::allocate(&config) {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    let fresh = blocks.len() - reused;
                    self.lock().stats.record_allocated(fresh);
                    self.release_blocks(blocks);
                    return Err(err);
                }
            }
        }

        {
            let mut state = self.lock();
            state.stats.record_allocated(needed - reused);
            state.stats.record_request();
        }
        trace!(line_size, lines, reused, fresh = needed - reused, "Served pooled buffer");

        let lines_per_block = config.block_size() / line_size;
        Ok(PixelBuffer::new(
            self,
            Storage::Blocks(blocks),
            line_size,
            lines,
            lines_per_block,
        ))
    }

    fn allocate_large(
        &self,
        config: &ArenaConfig,
        line_size: usize,
        lines: usize,
    ) -> MemoryResult<PixelBuffer<'_>> {
        let mut regions = Vec::new();
        reserve_parts(&mut regions, lines)?;
        for _ in 0..lines {
            match LargeAllocation::allocate(line_size, config.alignment()) {
                Ok(region) => regions.push(region),
                Err(err) => {
                    {
                        let mut state = self.lock();
                        state.stats.record_allocated(regions.len());
                        state.stats.record_reallocated(regions.len());
                    }
                    self.release_large(regions);
                    return Err(err);
                }
            }
        }

        {
            let mut state = self.lock();
            state.stats.record_allocated(lines);
            state.stats.record_reallocated(lines);
            state.stats.record_request();
        }
        trace!(line_size, lines, "Served large buffer");

        Ok(PixelBuffer::new(self, Storage::Large(regions), line_size, lines, 1))
    }

    /// Returns pooled blocks to the cache or the system
    pub(crate) fn release_blocks(&self, blocks: Vec<Block>) {
        let count = blocks.len();
        let rejected: Vec<Block> = {
            let mut state = self.lock();
            let ArenaState {
                config,
                pool,
                stats,
            } = &mut *state;
            blocks
                .into_iter()
                .filter_map(|block| pool.release(block, config, stats))
                .collect()
        };
        trace!(count, freed = rejected.len(), "Released pooled blocks");
    }

    /// Frees large allocations; they are never cached
    pub(crate) fn release_large(&self, regions: Vec<LargeAllocation>) {
        self.lock().stats.record_freed(regions.len());
        trace!(count = regions.len(), "Released large allocations");
        drop(regions);
    }

    // ------------------------------------------------------------------
    // Cache and statistics
    // ------------------------------------------------------------------

    /// Frees cached blocks until at most `keep` remain
    ///
    /// Returns the number of blocks freed. `clear_cache(0)` is a full flush.
    pub fn clear_cache(&self, keep: usize) -> usize {
        let evicted = {
            let mut state = self.lock();
            let ArenaState { pool, stats, .. } = &mut *state;
            pool.trim(keep, stats)
        };
        if !evicted.is_empty() {
            debug!(keep, evicted = evicted.len(), "Cleared arena cache");
        }
        evicted.len()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> ArenaStats {
        self.lock().stats
    }

    /// Flushes the cache and zeroes every counter
    ///
    /// The flush keeps `blocks_cached` truthful: right after a reset the
    /// cache is empty and every counter reads zero.
    pub fn reset_stats(&self) {
        let evicted = {
            let mut state = self.lock();
            let evicted = state.flush();
            state.stats.reset();
            evicted
        };
        debug!(evicted = evicted.len(), "Reset arena statistics");
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Arena")
            .field("config", &state.config)
            .field("stats", &state.stats)
            .field("cached", &state.pool.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_arena(blocks_max: usize) -> Arena {
        Arena::with_config(
            ArenaConfig::new()
                .with_block_size(4096)
                .unwrap()
                .with_blocks_max(blocks_max)
                .unwrap(),
        )
    }

    #[test]
    fn test_setter_failure_keeps_config() {
        let arena = Arena::new();
        assert!(arena.set_alignment(3).is_err());
        assert!(arena.set_block_size(4000).is_err());
        assert_eq!(arena.config(), ArenaConfig::default());
    }

    #[test]
    fn test_small_request_takes_one_block() {
        let arena = small_arena(0);
        let buffer = arena.allocate(100).unwrap();
        assert_eq!(buffer.block_count(), 1);

        let stats = arena.stats();
        assert_eq!(stats.new_count, 1);
        assert_eq!(stats.allocated_blocks, 1);
        assert_eq!(stats.reallocated_blocks, 0);
    }

    #[test]
    fn test_reuse_before_allocate() {
        let arena = small_arena(4);
        drop(arena.allocate(4096).unwrap());
        assert_eq!(arena.stats().blocks_cached, 1);

        let _buffer = arena.allocate(4096).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.allocated_blocks, 1);
        assert_eq!(stats.reused_blocks, 1);
        assert_eq!(stats.blocks_cached, 0);
    }

    #[test]
    fn test_request_larger_than_block_is_isolated() {
        let arena = small_arena(4);
        drop(arena.allocate(4096).unwrap());

        let buffer = arena.allocate(4097).unwrap();
        assert!(buffer.is_large());
        assert_eq!(arena.stats().blocks_cached, 1);
        drop(buffer);

        let stats = arena.stats();
        assert_eq!(stats.blocks_cached, 1);
        assert_eq!(stats.reallocated_blocks, 1);
        assert_eq!(stats.freed_blocks, 1);
    }

    #[test]
    fn test_set_blocks_max_trims_cache() {
        let arena = small_arena(8);
        drop(arena.allocate_lines(4096, 8).unwrap());
        assert_eq!(arena.stats().blocks_cached, 8);

        arena.set_blocks_max(3).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.blocks_cached, 3);
        assert_eq!(stats.freed_blocks, 5);
    }

    #[test]
    fn test_geometry_change_flushes_cache() {
        let arena = small_arena(8);
        drop(arena.allocate_lines(4096, 4).unwrap());

        arena.set_block_size(4096).unwrap();
        assert_eq!(arena.stats().blocks_cached, 4);

        arena.set_block_size(8192).unwrap();
        assert_eq!(arena.stats().blocks_cached, 0);
        assert_eq!(arena.stats().freed_blocks, 4);

        drop(arena.allocate(10).unwrap());
        arena.set_alignment(16).unwrap();
        assert_eq!(arena.stats().blocks_cached, 0);
    }

    #[test]
    fn test_outstanding_blocks_keep_geometry() {
        let arena = small_arena(8);
        let buffer = arena.allocate_lines(4096, 2).unwrap();

        arena.set_block_size(8192).unwrap();
        assert_eq!(buffer.line(1).unwrap().len(), 4096);
        drop(buffer);

        let stats = arena.stats();
        assert_eq!(stats.blocks_cached, 0);
        assert_eq!(stats.freed_blocks, 2);
    }

    #[test]
    fn test_reset_stats_flushes_cache() {
        let arena = small_arena(8);
        drop(arena.allocate_lines(4096, 5).unwrap());
        arena.reset_stats();
        assert_eq!(arena.stats(), ArenaStats::default());

        let _buffer = arena.allocate(1).unwrap();
        assert_eq!(arena.stats().reused_blocks, 0);
        assert_eq!(arena.stats().allocated_blocks, 1);
    }

    #[test]
    fn test_size_overflow() {
        let arena = small_arena(0);
        let err = arena.allocate_lines(usize::MAX, 2).unwrap_err();
        assert_eq!(err.code(), "MEM:ALLOC:OVERFLOW");
        assert_eq!(arena.stats().new_count, 0);
    }

    #[test]
    fn test_oom_is_reported_and_state_stays_consistent() {
        let arena = small_arena(4);
        let err = arena.allocate(isize::MAX as usize).unwrap_err();
        assert!(err.is_out_of_memory());

        let stats = arena.stats();
        assert_eq!(stats.new_count, 0);
        assert_eq!(stats.allocated_blocks, stats.freed_blocks);
        assert_eq!(stats.blocks_cached, 0);
    }

    #[test]
    fn test_huge_line_count_is_reported_not_aborted() {
        let arena = small_arena(4);
        drop(arena.allocate_lines(4096, 2).unwrap());
        assert_eq!(arena.stats().blocks_cached, 2);

        // Pooled path: one-byte lines, bookkeeping for ~2^52 blocks
        let err = arena.allocate_lines(1, usize::MAX).unwrap_err();
        assert!(err.is_out_of_memory());

        // Large path: bookkeeping for ~2^52 regions
        let err = arena.allocate_lines(4097, usize::MAX / 4097).unwrap_err();
        assert!(err.is_out_of_memory());

        let stats = arena.stats();
        assert_eq!(stats.new_count, 1);
        assert_eq!(stats.blocks_cached, 2);
        assert_eq!(
            stats.allocated_blocks,
            stats.freed_blocks + stats.blocks_cached
        );
    }

    #[test]
    fn test_debug_reports_cached_blocks() {
        let arena = small_arena(4);
        drop(arena.allocate(10).unwrap());
        assert!(format!("{arena:?}").contains("cached: 1"));
    }
}
