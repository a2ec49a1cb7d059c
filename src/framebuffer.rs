//! Host-side RGB framebuffer
//!
//! [`FrameBuffer`] owns the full `W * H * 3` pixel store and the
//! [`DirtyChunkMap`] it feeds. Pixels keep their value until overwritten;
//! nothing clears the buffer implicitly.

use alloc::vec::Vec;

use crate::color::{BYTES_PER_PIXEL, Rgb};
use crate::config::{Config, Mirror};
use crate::dirty::DirtyChunkMap;
use crate::error::AllocError;
use crate::mirror::{apply_mirror, mirror_span};
use crate::scratch::try_alloc;

/// Sink for single pixel writes
///
/// Drawing code only needs this capability; coordinates outside the
/// target are dropped by the implementation.
pub trait PixelSink {
    /// Write one pixel at logical coordinates
    fn write_pixel(&mut self, x: i32, y: i32, color: Rgb);
}

/// RGB pixel store with dirty chunk tracking
#[derive(Debug)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    mirror: Mirror,
    dirty: DirtyChunkMap,
}

impl FrameBuffer {
    /// Allocate a black framebuffer for the configured geometry
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the pixel store or the chunk map cannot be
    /// allocated.
    pub fn new(config: &Config) -> Result<Self, AllocError> {
        let width = config.geometry.width();
        let height = config.geometry.height();
        Ok(Self {
            pixels: try_alloc(config.geometry.buffer_size(), 0u8)?,
            width,
            height,
            mirror: config.mirror,
            dirty: DirtyChunkMap::new(width, usize::from(config.chunk_width))?,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Store one pixel and mark its chunk dirty
    ///
    /// Out-of-range coordinates are dropped.
    #[inline]
    pub fn write_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        let Some((x, y)) = self.physical(x, y) else {
            return;
        };
        let offset = (y * self.width + x) * BYTES_PER_PIXEL;
        self.pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color.to_bytes());
        self.dirty.mark(x);
    }

    /// Read back one pixel at logical coordinates
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        let (x, y) = self.physical(x, y)?;
        let offset = (y * self.width + x) * BYTES_PER_PIXEL;
        let bytes = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some(Rgb::new(bytes[0], bytes[1], bytes[2]))
    }

    /// Overwrite every pixel and mark every chunk dirty
    pub fn fill(&mut self, color: Rgb) {
        let bytes = color.to_bytes();
        for pixel in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&bytes);
        }
        self.dirty.mark_all();
    }

    /// Fill a rectangle, clipped to the framebuffer
    ///
    /// Only chunks overlapping the clipped columns are marked dirty.
    #[allow(clippy::many_single_char_names)]
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb) {
        let Some((x0, x1)) = clip(x, w, self.width) else {
            return;
        };
        let Some((y0, y1)) = clip(y, h, self.height) else {
            return;
        };
        let (x0, x1) = mirror_span(x0, x1, self.width, self.mirror.flips_x());
        let (y0, y1) = mirror_span(y0, y1, self.height, self.mirror.flips_y());

        let bytes = color.to_bytes();
        let stride = self.width * BYTES_PER_PIXEL;
        for row in y0..y1 {
            let start = row * stride + x0 * BYTES_PER_PIXEL;
            let end = row * stride + x1 * BYTES_PER_PIXEL;
            for pixel in self.pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel.copy_from_slice(&bytes);
            }
        }
        self.dirty.mark_range(x0, x1);
    }

    /// Raw pixel bytes in physical row-major order
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Dirty chunk state
    pub fn dirty(&self) -> &DirtyChunkMap {
        &self.dirty
    }

    /// Dirty chunk state, mutably
    pub fn dirty_mut(&mut self) -> &mut DirtyChunkMap {
        &mut self.dirty
    }

    /// Pixels and dirty map borrowed together for a flush pass
    pub(crate) fn split(&mut self) -> (&[u8], &mut DirtyChunkMap) {
        (&self.pixels, &mut self.dirty)
    }

    fn physical(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        let x = usize::try_from(x).ok().filter(|x| *x < self.width)?;
        let y = usize::try_from(y).ok().filter(|y| *y < self.height)?;
        Some(apply_mirror(x, y, self.width, self.height, self.mirror))
    }
}

impl PixelSink for FrameBuffer {
    fn write_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        Self::write_pixel(self, x, y, color);
    }
}

/// Clip the span `[start, start + len)` to `[0, extent)`
fn clip(start: i32, len: u32, extent: usize) -> Option<(usize, usize)> {
    let end = i64::from(start) + i64::from(len);
    let start = i64::from(start).max(0);
    let end = end.min(extent as i64);
    if start >= end {
        return None;
    }
    Some((start as usize, end as usize))
}
