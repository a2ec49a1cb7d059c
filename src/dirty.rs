//! Dirty chunk tracking
//!
//! The framebuffer is split into vertical chunks of `chunk_width` columns
//! spanning the full height. [`DirtyChunkMap`] keeps one flag per chunk,
//! set by every pixel write inside it and cleared once that chunk has been
//! handed to the remote controller.
//!
//! ## Example
//!
//! ```
//! use fpga_matrix_display::DirtyChunkMap;
//!
//! let mut dirty = match DirtyChunkMap::new(128, 32) {
//!     Ok(dirty) => dirty,
//!     Err(_) => return,
//! };
//! dirty.mark(10);
//! dirty.mark(100);
//! assert!(dirty.any_dirty());
//! assert!(dirty.for_each_dirty().eq([0, 3]));
//! ```

use alloc::vec::Vec;

use crate::error::AllocError;
use crate::scratch::try_alloc;

/// One dirty flag per vertical chunk
#[derive(Debug, Clone)]
pub struct DirtyChunkMap {
    chunks: Vec<bool>,
    chunk_width: usize,
    width: usize,
    any_dirty: bool,
}

impl DirtyChunkMap {
    /// Allocate a clean map covering `width` columns
    ///
    /// A zero `chunk_width` is treated as one column.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the flag storage cannot be allocated.
    pub fn new(width: usize, chunk_width: usize) -> Result<Self, AllocError> {
        let chunk_width = chunk_width.max(1);
        let count = width.div_ceil(chunk_width);
        Ok(Self {
            chunks: try_alloc(count, false)?,
            chunk_width,
            width,
            any_dirty: false,
        })
    }

    /// Mark the chunk containing column `x`
    ///
    /// Columns past the covered width are ignored.
    #[inline]
    pub fn mark(&mut self, x: usize) {
        if x >= self.width {
            return;
        }
        if let Some(flag) = self.chunks.get_mut(x / self.chunk_width) {
            *flag = true;
            self.any_dirty = true;
        }
    }

    /// Mark every chunk overlapping columns `[start, end)`
    pub fn mark_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.width);
        if start >= end {
            return;
        }
        let first = start / self.chunk_width;
        let last = (end - 1) / self.chunk_width;
        for flag in &mut self.chunks[first..=last] {
            *flag = true;
        }
        self.any_dirty = true;
    }

    /// Mark every chunk, forcing a full repaint
    pub fn mark_all(&mut self) {
        self.chunks.fill(true);
        self.any_dirty = !self.chunks.is_empty();
    }

    /// Clear the flag of one chunk
    ///
    /// `any_dirty` is left untouched until [`recompute_any_dirty`](Self::recompute_any_dirty).
    pub fn clear(&mut self, chunk: usize) {
        if let Some(flag) = self.chunks.get_mut(chunk) {
            *flag = false;
        }
    }

    /// Recompute `any_dirty` from the flags and return it
    pub fn recompute_any_dirty(&mut self) -> bool {
        self.any_dirty = self.chunks.iter().any(|flag| *flag);
        self.any_dirty
    }

    /// Whether any chunk may need flushing
    #[inline]
    pub fn any_dirty(&self) -> bool {
        self.any_dirty
    }

    /// Whether a specific chunk is dirty
    pub fn is_dirty(&self, chunk: usize) -> bool {
        self.chunks.get(chunk).copied().unwrap_or(false)
    }

    /// First dirty chunk at or after `from`
    pub fn next_dirty(&self, from: usize) -> Option<usize> {
        self.chunks
            .get(from..)?
            .iter()
            .position(|flag| *flag)
            .map(|offset| from + offset)
    }

    /// Dirty chunk indices in ascending order
    ///
    /// The iterator is lazy and reflects the flags at the time each index
    /// is produced; calling this again starts from chunk 0.
    pub fn for_each_dirty(&self) -> DirtyChunks<'_> {
        DirtyChunks { map: self, next: 0 }
    }

    /// Number of dirty chunks
    pub fn dirty_count(&self) -> usize {
        self.chunks.iter().filter(|flag| **flag).count()
    }

    /// Column range `(x, w)` of a chunk
    ///
    /// The last chunk is narrower when the width is not a multiple of the
    /// chunk width.
    pub fn chunk_span(&self, chunk: usize) -> Option<(usize, usize)> {
        if chunk >= self.chunks.len() {
            return None;
        }
        let x = chunk * self.chunk_width;
        Some((x, self.chunk_width.min(self.width - x)))
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Width of a full chunk in columns
    pub fn chunk_width(&self) -> usize {
        self.chunk_width
    }

    /// Covered width in columns
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Iterator over dirty chunk indices, see [`DirtyChunkMap::for_each_dirty`]
#[derive(Debug, Clone)]
pub struct DirtyChunks<'a> {
    map: &'a DirtyChunkMap,
    next: usize,
}

impl Iterator for DirtyChunks<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.map.next_dirty(self.next)?;
        self.next = index + 1;
        Some(index)
    }
}
