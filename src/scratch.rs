//! Scratch transfer buffer
//!
//! A single staging buffer sized for the widest chunk. Chunks are repacked
//! into it because the framebuffer's row stride is the full display width
//! while a rectangle payload must be contiguous per chunk row.

use alloc::vec::Vec;

use crate::color::{BYTES_PER_PIXEL, Rgb};
use crate::error::AllocError;

/// Allocate a vector of `len` copies of `value` without aborting on failure
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>, AllocError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| AllocError {
            requested: len.saturating_mul(core::mem::size_of::<T>()),
        })?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// A payload did not fit in the scratch buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overflow {
    /// Payload size in bytes
    pub required: usize,
    /// Scratch capacity in bytes
    pub capacity: usize,
}

/// Reusable staging buffer for one chunk payload
#[derive(Debug)]
pub struct ScratchTransferBuffer {
    bytes: Vec<u8>,
}

impl ScratchTransferBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the memory cannot be allocated.
    pub fn allocate(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            bytes: try_alloc(capacity, 0u8)?,
        })
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Packed payload of the last `byte_count` bytes written
    pub fn payload(&self, byte_count: usize) -> &[u8] {
        &self.bytes[..byte_count.min(self.bytes.len())]
    }

    /// Copy columns `[x, x + w)` of every row of `frame` into the buffer
    ///
    /// `frame` is a row-major RGB buffer `frame_width` pixels wide and
    /// `height` rows tall. Row `y` of the chunk lands at offset `y * w * 3`.
    /// Returns the payload size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Overflow`] without touching the buffer if the chunk does
    /// not fit.
    pub fn pack_chunk(
        &mut self,
        frame: &[u8],
        frame_width: usize,
        height: usize,
        x: usize,
        w: usize,
    ) -> Result<usize, Overflow> {
        let row_bytes = w * BYTES_PER_PIXEL;
        let required = self.check(row_bytes * height)?;
        let stride = frame_width * BYTES_PER_PIXEL;
        let rows = self.bytes[..required].chunks_exact_mut(row_bytes.max(1));
        for (y, dst) in rows.enumerate() {
            let start = y * stride + x * BYTES_PER_PIXEL;
            dst.copy_from_slice(&frame[start..start + row_bytes]);
        }
        Ok(required)
    }

    /// Fill a `w` x `height` payload where column `i` has `color_at(i)`
    ///
    /// Returns the payload size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Overflow`] without touching the buffer if the payload does
    /// not fit.
    pub fn fill_columns<F>(&mut self, w: usize, height: usize, color_at: F) -> Result<usize, Overflow>
    where
        F: Fn(usize) -> Rgb,
    {
        let row_bytes = w * BYTES_PER_PIXEL;
        let required = self.check(row_bytes * height)?;
        for row in self.bytes[..required].chunks_exact_mut(row_bytes.max(1)) {
            for (column, pixel) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                pixel.copy_from_slice(&color_at(column).to_bytes());
            }
        }
        Ok(required)
    }

    fn check(&self, required: usize) -> Result<usize, Overflow> {
        if required > self.bytes.len() {
            return Err(Overflow {
                required,
                capacity: self.bytes.len(),
            });
        }
        Ok(required)
    }
}
