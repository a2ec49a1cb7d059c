//! Chunked flush protocol
//!
//! [`FlushEngine`] pushes only the dirty chunks of a [`FrameBuffer`] to the
//! remote controller, one chunk at a time through a single
//! [`ScratchTransferBuffer`].
//!
//! ## Buffer reuse
//!
//! The background worker may still be reading the previous payload out of
//! the scratch buffer when `draw_rect_prealloc` returns. Every chunk is
//! therefore bracketed by two idle waits:
//!
//! 1. wait idle, then repack the scratch buffer
//! 2. submit the rectangle
//! 3. wait idle, then clear the chunk's dirty flag
//!
//! A chunk whose submission fails, or that does not fit the scratch
//! buffer, stays dirty and the pass stops there; the next update cycle
//! retries it.

use embedded_hal::delay::DelayNs;
use log::{debug, error, trace};

use crate::color::Rgb;
use crate::error::Error;
use crate::framebuffer::FrameBuffer;
use crate::link::DeviceLink;
use crate::scratch::{Overflow, ScratchTransferBuffer};

type FlushResult<L, T> = core::result::Result<T, Error<L>>;

/// Outcome of a single flush pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Chunks handed to the link
    pub chunks_sent: usize,
    /// Payload bytes handed to the link
    pub bytes_sent: usize,
}

/// Flush statistics accumulated over the engine's lifetime
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlushStats {
    /// Passes that found at least one dirty chunk
    pub passes: u32,
    /// Passes aborted before every dirty chunk was sent
    pub incomplete_passes: u32,
    /// Chunks sent in total
    pub chunks_sent: u64,
    /// Payload bytes sent in total
    pub bytes_sent: u64,
    /// Running average of chunks sent per pass
    pub avg_chunks_per_pass: f32,
}

impl FlushStats {
    /// Weight of the newest pass in the running average
    const AVERAGE_WEIGHT: f32 = 0.125;

    fn record(&mut self, report: &FlushReport, complete: bool) {
        self.passes = self.passes.saturating_add(1);
        if !complete {
            self.incomplete_passes = self.incomplete_passes.saturating_add(1);
        }
        self.chunks_sent = self.chunks_sent.saturating_add(report.chunks_sent as u64);
        self.bytes_sent = self.bytes_sent.saturating_add(report.bytes_sent as u64);

        #[allow(clippy::cast_precision_loss)]
        let sample = report.chunks_sent as f32;
        if self.passes == 1 {
            self.avg_chunks_per_pass = sample;
        } else {
            self.avg_chunks_per_pass += (sample - self.avg_chunks_per_pass) * Self::AVERAGE_WEIGHT;
        }
    }
}

/// Drives dirty chunks from a framebuffer to the link
#[derive(Debug)]
pub struct FlushEngine {
    scratch: ScratchTransferBuffer,
    idle_poll_us: u32,
    stats: FlushStats,
}

impl FlushEngine {
    /// Create an engine owning `scratch`
    ///
    /// `idle_poll_us` is the pause between worker idle polls.
    pub fn new(scratch: ScratchTransferBuffer, idle_poll_us: u32) -> Self {
        Self {
            scratch,
            idle_poll_us,
            stats: FlushStats::default(),
        }
    }

    /// Send every dirty chunk of `frame` and commit the frame
    ///
    /// Does nothing, and makes no link calls, when no chunk is dirty.
    /// When at least one chunk was sent the frame is committed with
    /// `swap_frame` then `copy_frame`, even if the pass stopped early.
    ///
    /// # Errors
    ///
    /// - [`Error::ChunkTooLarge`] if a chunk does not fit the scratch buffer
    /// - [`Error::Link`] if a link call fails
    ///
    /// In both cases the failing chunk and all later chunks remain dirty.
    pub fn flush<L, D>(
        &mut self,
        frame: &mut FrameBuffer,
        link: &mut L,
        delay: &mut D,
    ) -> FlushResult<L, FlushReport>
    where
        L: DeviceLink,
        D: DelayNs,
    {
        if !frame.dirty().any_dirty() {
            return Ok(FlushReport::default());
        }

        let width = frame.width();
        let height = frame.height();
        let (pixels, dirty) = frame.split();
        let mut report = FlushReport::default();
        let mut failure = None;
        let mut cursor = 0;

        while let Some(chunk) = dirty.next_dirty(cursor) {
            cursor = chunk + 1;
            let Some((x, w)) = dirty.chunk_span(chunk) else {
                break;
            };

            // The worker may still be reading the previous chunk
            link.wait_idle(delay, self.idle_poll_us);

            let byte_count = match self.scratch.pack_chunk(pixels, width, height, x, w) {
                Ok(byte_count) => byte_count,
                Err(overflow) => {
                    failure = Some(self.oversized(chunk, overflow));
                    break;
                }
            };

            if let Err(err) = self.submit(link, delay, x, w, height, byte_count) {
                error!("Flush aborted at chunk {chunk}: {err}");
                failure = Some(err);
                break;
            }

            dirty.clear(chunk);
            report.chunks_sent += 1;
            report.bytes_sent += byte_count;
            trace!("Sent chunk {chunk} (x={x}, w={w}, {byte_count} bytes)");
        }

        let committed = if report.chunks_sent > 0 {
            Self::commit(link)
        } else {
            Ok(())
        };
        if committed.is_err() {
            // Remote frame state is unknown; repaint everything next cycle
            dirty.mark_all();
        }
        dirty.recompute_any_dirty();

        let complete = failure.is_none() && committed.is_ok();
        self.stats.record(&report, complete);
        debug!(
            "Flush pass: {} chunks, {} bytes, complete={complete}",
            report.chunks_sent, report.bytes_sent
        );

        if let Some(err) = failure {
            return Err(err);
        }
        committed?;
        Ok(report)
    }

    /// Paint a full-screen pattern straight from the scratch buffer
    ///
    /// The display is walked in chunks of `chunk_width` columns; column
    /// `x` is painted `color_at(x)`. The framebuffer is not touched.
    /// Returns the number of chunks sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk does not fit the scratch buffer or a
    /// link call fails.
    pub fn paint_columns<L, D, F>(
        &mut self,
        link: &mut L,
        delay: &mut D,
        width: usize,
        height: usize,
        chunk_width: usize,
        color_at: F,
    ) -> FlushResult<L, usize>
    where
        L: DeviceLink,
        D: DelayNs,
        F: Fn(usize) -> Rgb,
    {
        let chunk_width = chunk_width.max(1);
        let mut sent = 0;
        for (chunk, x) in (0..width).step_by(chunk_width).enumerate() {
            let w = chunk_width.min(width - x);
            link.wait_idle(delay, self.idle_poll_us);
            let byte_count = self
                .scratch
                .fill_columns(w, height, |column| color_at(x + column))
                .map_err(|overflow| self.oversized(chunk, overflow))?;
            self.submit(link, delay, x, w, height, byte_count)?;
            sent += 1;
        }
        if sent > 0 {
            Self::commit(link)?;
        }
        Ok(sent)
    }

    /// Statistics accumulated so far
    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Scratch buffer capacity in bytes
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Hand the packed scratch payload to the link and wait until consumed
    #[allow(clippy::many_single_char_names)]
    fn submit<L, D>(
        &self,
        link: &mut L,
        delay: &mut D,
        x: usize,
        w: usize,
        height: usize,
        byte_count: usize,
    ) -> FlushResult<L, ()>
    where
        L: DeviceLink,
        D: DelayNs,
    {
        link.draw_rect_prealloc(
            x as u16,
            0,
            w as u16,
            height as u16,
            self.scratch.payload(byte_count),
            byte_count,
        )
        .map_err(Error::Link)?;
        link.wait_idle(delay, self.idle_poll_us);
        Ok(())
    }

    fn commit<L: DeviceLink>(link: &mut L) -> FlushResult<L, ()> {
        link.swap_frame().map_err(Error::Link)?;
        link.copy_frame().map_err(Error::Link)
    }

    fn oversized<L: DeviceLink>(&self, chunk: usize, overflow: Overflow) -> Error<L> {
        error!(
            "Chunk {chunk} needs {} bytes but scratch buffer holds {}",
            overflow.required, overflow.capacity
        );
        Error::ChunkTooLarge {
            chunk,
            required: overflow.required,
            capacity: overflow.capacity,
        }
    }
}
