//! Test doubles shared by the unit tests

use alloc::vec::Vec;
use core::cell::Cell;
use embedded_hal::delay::DelayNs;

use crate::link::{DeviceLink, WatchdogLink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Begin,
    Clear,
    Brightness(u8),
    Rect {
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        bytes: Vec<u8>,
    },
    Swap,
    Copy,
    Resync(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Link that records every call and simulates a background worker
///
/// Each rectangle keeps the worker busy for `busy_polls_per_rect` idle
/// polls. Submitting a rectangle while the worker is still busy is recorded
/// in `overlapping_submits`.
#[derive(Debug)]
pub struct MockLink {
    pub calls: Vec<Call>,
    pub worker_enabled: bool,
    pub busy_polls_per_rect: u32,
    pub busy_remaining: Cell<u32>,
    pub overlapping_submits: u32,
    pub fail_rect_at: Option<usize>,
    pub rects_attempted: usize,
    pub reset_pending: bool,
    pub epoch: u32,
    pub fail_resyncs: u32,
    pub feeds: Cell<u32>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            worker_enabled: true,
            busy_polls_per_rect: 0,
            busy_remaining: Cell::new(0),
            overlapping_submits: 0,
            fail_rect_at: None,
            rects_attempted: 0,
            reset_pending: false,
            epoch: 0,
            fail_resyncs: 0,
            feeds: Cell::new(0),
        }
    }

    /// Simulate the remote controller rebooting
    pub fn trigger_reset(&mut self) {
        self.reset_pending = true;
        self.epoch += 1;
    }

    pub fn rects(&self) -> Vec<(u16, u16, u16, u16)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Rect { x, y, w, h, .. } => Some((*x, *y, *w, *h)),
                _ => None,
            })
            .collect()
    }

    /// Payload of the `index`-th rectangle
    pub fn rect_bytes(&self, index: usize) -> Option<&[u8]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Rect { bytes, .. } => Some(bytes.as_slice()),
                _ => None,
            })
            .nth(index)
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }
}

impl WatchdogLink for MockLink {
    fn feed_watchdog(&self) {
        self.feeds.set(self.feeds.get() + 1);
    }
}

impl DeviceLink for MockLink {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Begin);
        Ok(())
    }

    fn clear_screen(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Clear);
        Ok(())
    }

    fn set_brightness8(&mut self, level: u8) -> Result<(), Self::Error> {
        self.calls.push(Call::Brightness(level));
        Ok(())
    }

    fn draw_rect_prealloc(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        buffer: &[u8],
        byte_count: usize,
    ) -> Result<(), Self::Error> {
        let attempt = self.rects_attempted;
        self.rects_attempted += 1;
        if self.fail_rect_at == Some(attempt) {
            return Err(MockError);
        }
        if self.busy_remaining.get() > 0 {
            self.overlapping_submits += 1;
        }
        self.calls.push(Call::Rect {
            x,
            y,
            w,
            h,
            bytes: buffer[..byte_count].to_vec(),
        });
        if self.worker_enabled {
            self.busy_remaining.set(self.busy_polls_per_rect);
        }
        Ok(())
    }

    fn swap_frame(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Swap);
        Ok(())
    }

    fn copy_frame(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Copy);
        Ok(())
    }

    fn is_worker_enabled(&self) -> bool {
        self.worker_enabled
    }

    fn worker_is_idle(&self) -> bool {
        let remaining = self.busy_remaining.get();
        if remaining == 0 {
            return true;
        }
        self.busy_remaining.set(remaining - 1);
        false
    }

    fn consume_reset_flag(&mut self) -> bool {
        core::mem::take(&mut self.reset_pending)
    }

    fn resync_after_reset(&mut self, brightness: u8) -> Result<(), Self::Error> {
        if self.fail_resyncs > 0 {
            self.fail_resyncs -= 1;
            return Err(MockError);
        }
        self.calls.push(Call::Resync(brightness));
        Ok(())
    }

    fn reset_epoch(&self) -> u32 {
        self.epoch
    }
}

#[derive(Debug, Default)]
pub struct MockDelay {
    pub calls: u32,
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_ns += u64::from(us) * 1_000;
    }
}
