//! Allocator activity counters
//!
//! Five counters are monotonic between resets; `blocks_cached` is a gauge
//! that mirrors the current free-list length.

use core::fmt;

/// Snapshot of arena activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArenaStats {
    /// Top-level allocation requests served
    pub new_count: usize,
    /// Fresh blocks obtained from the operating system
    pub allocated_blocks: usize,
    /// Blocks served from the cache instead of the operating system
    pub reused_blocks: usize,
    /// Blocks and large allocations returned to the operating system
    pub freed_blocks: usize,
    /// Allocations served by the large-allocation path
    pub reallocated_blocks: usize,
    /// Blocks currently held in the cache
    pub blocks_cached: usize,
}

impl ArenaStats {
    /// Field names in reporting order
    pub const FIELDS: [&'static str; 6] = [
        "new_count",
        "reused_blocks",
        "freed_blocks",
        "allocated_blocks",
        "reallocated_blocks",
        "blocks_cached",
    ];

    /// Creates a zeroed snapshot
    pub const fn new() -> Self {
        Self {
            new_count: 0,
            allocated_blocks: 0,
            reused_blocks: 0,
            freed_blocks: 0,
            reallocated_blocks: 0,
            blocks_cached: 0,
        }
    }

    /// Name/value pairs in [`ArenaStats::FIELDS`] order, for bindings that
    /// expose the counters as a mapping
    pub fn to_pairs(&self) -> [(&'static str, usize); 6] {
        let [new_count, reused, freed, allocated, reallocated, cached] = Self::FIELDS;
        [
            (new_count, self.new_count),
            (reused, self.reused_blocks),
            (freed, self.freed_blocks),
            (allocated, self.allocated_blocks),
            (reallocated, self.reallocated_blocks),
            (cached, self.blocks_cached),
        ]
    }

    /// Blocks handed out by the pool, fresh or reused
    pub fn blocks_served(&self) -> usize {
        self.allocated_blocks + self.reused_blocks
    }

    /// Fraction of pooled blocks served from the cache (0.0 to 1.0)
    pub fn reuse_ratio(&self) -> Option<f64> {
        let served = self.blocks_served();
        (served > 0).then(|| self.reused_blocks as f64 / served as f64)
    }

    /// Reset all counters to zero
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn record_request(&mut self) {
        self.new_count += 1;
    }

    pub(crate) fn record_allocated(&mut self, blocks: usize) {
        self.allocated_blocks += blocks;
    }

    pub(crate) fn record_reused(&mut self, blocks: usize) {
        self.reused_blocks += blocks;
    }

    pub(crate) fn record_freed(&mut self, blocks: usize) {
        self.freed_blocks += blocks;
    }

    pub(crate) fn record_reallocated(&mut self, allocations: usize) {
        self.reallocated_blocks += allocations;
    }

    pub(crate) fn set_cached(&mut self, blocks: usize) {
        self.blocks_cached = blocks;
    }
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Arena Statistics:")?;
        writeln!(f, "  Requests: {}", self.new_count)?;
        writeln!(f, "  Allocated blocks: {}", self.allocated_blocks)?;
        writeln!(f, "  Reused blocks: {}", self.reused_blocks)?;
        writeln!(f, "  Freed blocks: {}", self.freed_blocks)?;
        writeln!(f, "  Large allocations: {}", self.reallocated_blocks)?;
        writeln!(f, "  Cached blocks: {}", self.blocks_cached)?;

        if let Some(ratio) = self.reuse_ratio() {
            writeln!(f, "  Reuse ratio: {:.2}%", ratio * 100.0)?;
        }

        Ok(())
    }
}
