//! RAII owner of the memory behind one pixel buffer request

use core::fmt;

use super::{Arena, Block, LargeAllocation};

/// Memory parts of one request
#[derive(Default)]
pub(crate) enum Storage {
    /// Zero-byte request
    #[default]
    Empty,
    /// Lines packed into pooled blocks
    Blocks(Vec<Block>),
    /// One direct allocation per line
    Large(Vec<LargeAllocation>),
}

/// A line-addressed pixel buffer backed by arena memory
///
/// Dropping the buffer releases every part: pooled blocks go back to the
/// arena cache (or to the system when the cache is full), large
/// allocations are always freed.
///
/// Blocks served from the cache keep the bytes of their previous owner;
/// call [`PixelBuffer::fill`] when cleared memory is required.
pub struct PixelBuffer<'a> {
    arena: &'a Arena,
    storage: Storage,
    line_size: usize,
    lines: usize,
    lines_per_block: usize,
}

impl<'a> PixelBuffer<'a> {
    pub(crate) fn new(
        arena: &'a Arena,
        storage: Storage,
        line_size: usize,
        lines: usize,
        lines_per_block: usize,
    ) -> Self {
        Self {
            arena,
            storage,
            line_size,
            lines,
            lines_per_block,
        }
    }

    /// Arena this buffer returns its memory to
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Bytes per line
    pub fn line_size(&self) -> usize {
        self.line_size
    }

    /// Number of lines
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Total addressable bytes (`line_size * lines`)
    pub fn len(&self) -> usize {
        self.line_size * self.lines
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pooled blocks held
    pub fn block_count(&self) -> usize {
        match &self.storage {
            Storage::Blocks(blocks) => blocks.len(),
            Storage::Empty | Storage::Large(_) => 0,
        }
    }

    /// Pooled blocks held, in line order
    pub fn blocks(&self) -> &[Block] {
        match &self.storage {
            Storage::Blocks(blocks) => blocks,
            Storage::Empty | Storage::Large(_) => &[],
        }
    }

    /// Whether lines are stored as large allocations
    pub fn is_large(&self) -> bool {
        matches!(self.storage, Storage::Large(_))
    }

    /// Returns line `y`, or `None` when out of range
    pub fn line(&self, y: usize) -> Option<&[u8]> {
        if y >= self.lines {
            return None;
        }
        match &self.storage {
            Storage::Empty => Some(&[]),
            Storage::Blocks(blocks) => {
                let offset = (y % self.lines_per_block) * self.line_size;
                let block = &blocks[y / self.lines_per_block];
                Some(&block.as_slice()[offset..offset + self.line_size])
            }
            Storage::Large(regions) => Some(regions[y].as_slice()),
        }
    }

    /// Returns line `y` mutably, or `None` when out of range
    pub fn line_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        if y >= self.lines {
            return None;
        }
        match &mut self.storage {
            Storage::Empty => Some(&mut []),
            Storage::Blocks(blocks) => {
                let offset = (y % self.lines_per_block) * self.line_size;
                let block = &mut blocks[y / self.lines_per_block];
                Some(&mut block.as_mut_slice()[offset..offset + self.line_size])
            }
            Storage::Large(regions) => Some(regions[y].as_mut_slice()),
        }
    }

    /// Iterates over all lines in order
    pub fn iter_lines(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.lines).filter_map(move |y| self.line(y))
    }

    /// Sets every addressable byte to `byte`
    pub fn fill(&mut self, byte: u8) {
        for y in 0..self.lines {
            if let Some(line) = self.line_mut(y) {
                line.fill(byte);
            }
        }
    }

    /// Releases the buffer now; equivalent to dropping it
    pub fn release(self) {}
}

impl Drop for PixelBuffer<'_> {
    fn drop(&mut self) {
        match core::mem::take(&mut self.storage) {
            Storage::Empty => {}
            Storage::Blocks(blocks) => self.arena.release_blocks(blocks),
            Storage::Large(regions) => self.arena.release_large(regions),
        }
    }
}

impl fmt::Debug for PixelBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("line_size", &self.line_size)
            .field("lines", &self.lines)
            .field("lines_per_block", &self.lines_per_block)
            .field("block_count", &self.block_count())
            .field("is_large", &self.is_large())
            .finish()
    }
}
