//! Bump arena for short-lived bulk allocations.
//!
//! The rotation engine copies every candidate file name into an arena and
//! keeps only `(block, offset, len)` handles. Between passes the arena is
//! [`reset`](Arena::reset): bump offsets go back to zero, memory stays.

use thiserror::Error as ThisError;
use tracing::trace;

/// Alignment used when a caller asks for alignment 0.
pub const DEFAULT_ALIGN: usize = 16;
/// Largest supported alignment.
pub const MAX_ALIGN: usize = 4096;
/// Block size used by [`Arena::default`].
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Reasons an arena allocation can fail.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// Alignment is not 0, 1, or a power of two between 8 and 4096.
    #[error("unsupported alignment {0}")]
    BadAlignment(usize),
    /// No block has room and the arena may not grow.
    #[error("arena exhausted ({0} bytes requested)")]
    Exhausted(usize),
}

/// Handle to a slice handed out by an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaRef {
    block: usize,
    offset: usize,
    len: usize,
}

impl ArenaRef {
    /// Index of the block holding the slice.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Offset of the slice from the block base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length slices.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
struct Block {
    buf: Box<[u8]>,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    /// Aligned start offset for `size` bytes, if they fit.
    fn fit(&self, size: usize, align: usize) -> Option<usize> {
        let base = self.buf.as_ptr() as usize;
        let start = (base + self.used).next_multiple_of(align) - base;
        let end = start.checked_add(size)?;
        (end <= self.buf.len()).then_some(start)
    }

    fn free(&self) -> usize {
        self.buf.len() - self.used
    }
}

/// A pool of fixed-capacity blocks with bump allocation.
#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Block>,
    block_size: usize,
    growable: bool,
}

impl Arena {
    /// Create a growable arena. Blocks are allocated on first use.
    pub fn new(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_size: block_size.max(1),
            growable: true,
        }
    }

    /// Create an arena with a single preallocated block that never grows.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            blocks: vec![Block::new(capacity)],
            block_size: capacity,
            growable: false,
        }
    }

    /// Whether new blocks may be appended when the existing ones are full.
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Reserve `size` bytes aligned to `align`.
    ///
    /// Existing blocks are searched first. When none has room a new block of
    /// `max(block_size, size + align)` bytes is appended, unless the arena is
    /// fixed, in which case [`ArenaError::Exhausted`] is returned.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<ArenaRef, ArenaError> {
        let align = normalize_align(align)?;

        for (index, block) in self.blocks.iter_mut().enumerate() {
            if let Some(offset) = block.fit(size, align) {
                block.used = offset + size;
                return Ok(ArenaRef {
                    block: index,
                    offset,
                    len: size,
                });
            }
        }

        if !self.growable {
            return Err(ArenaError::Exhausted(size));
        }

        let block_size = self.block_size.max(size + align);
        trace!(
            block_size,
            blocks = self.blocks.len(),
            "Growing arena with a new block"
        );
        let mut block = Block::new(block_size);
        let offset = block.fit(size, align).ok_or(ArenaError::Exhausted(size))?;
        block.used = offset + size;
        self.blocks.push(block);

        Ok(ArenaRef {
            block: self.blocks.len() - 1,
            offset,
            len: size,
        })
    }

    /// Copy `bytes` into the arena, unaligned.
    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> Result<ArenaRef, ArenaError> {
        let slot = self.allocate(bytes.len(), 1)?;
        self.get_mut(slot).copy_from_slice(bytes);
        Ok(slot)
    }

    /// Borrow the bytes behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued before [`destroy`](Self::destroy).
    pub fn get(&self, slot: ArenaRef) -> &[u8] {
        &self.blocks[slot.block].buf[slot.offset..slot.offset + slot.len]
    }

    /// Mutably borrow the bytes behind a handle.
    pub fn get_mut(&mut self, slot: ArenaRef) -> &mut [u8] {
        &mut self.blocks[slot.block].buf[slot.offset..slot.offset + slot.len]
    }

    /// Forget every allocation but keep the blocks for reuse.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.used = 0;
        }
    }

    /// Release every block. A fixed arena keeps nothing and fails all
    /// further allocations.
    pub fn destroy(&mut self) {
        self.blocks.clear();
        self.blocks.shrink_to_fit();
    }

    /// Number of blocks currently held.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total bytes reserved across all blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|b| b.buf.len()).sum()
    }

    /// Bytes still free across all blocks, ignoring alignment padding.
    pub fn available(&self) -> usize {
        self.blocks.iter().map(Block::free).sum()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

fn normalize_align(align: usize) -> Result<usize, ArenaError> {
    match align {
        0 => Ok(DEFAULT_ALIGN),
        1 => Ok(1),
        a if a.is_power_of_two() && (8..=MAX_ALIGN).contains(&a) => Ok(a),
        a => Err(ArenaError::BadAlignment(a)),
    }
}
