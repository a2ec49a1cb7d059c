//! Remote controller link abstraction
//!
//! This module provides the [`DeviceLink`] trait the driver uses to talk to
//! the FPGA matrix controller. The transfer protocol itself (SPI framing,
//! the background transfer worker, the reset-status pin) lives in the
//! implementation; the driver only issues the calls below.
//!
//! ## Buffer ownership
//!
//! [`DeviceLink::draw_rect_prealloc`] may hand the payload to a background
//! worker that keeps reading it after the call returns. The caller must not
//! rewrite that memory until [`DeviceLink::worker_is_idle`] reports true.
//! [`DeviceLink::wait_idle`] is the only way the driver waits for that, and
//! it has no timeout: a worker that never goes idle stalls the update cycle.
//!
//! ## Example
//!
//! ```
//! use core::convert::Infallible;
//! use fpga_matrix_display::{DeviceLink, WatchdogLink};
//!
//! struct NullLink;
//!
//! impl WatchdogLink for NullLink {
//!     fn feed_watchdog(&self) {}
//! }
//!
//! impl DeviceLink for NullLink {
//!     type Error = Infallible;
//!     fn begin(&mut self) -> Result<(), Self::Error> { Ok(()) }
//!     fn clear_screen(&mut self) -> Result<(), Self::Error> { Ok(()) }
//!     fn set_brightness8(&mut self, _level: u8) -> Result<(), Self::Error> { Ok(()) }
//!     fn draw_rect_prealloc(
//!         &mut self,
//!         _x: u16,
//!         _y: u16,
//!         _w: u16,
//!         _h: u16,
//!         _buffer: &[u8],
//!         _byte_count: usize,
//!     ) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//!     fn swap_frame(&mut self) -> Result<(), Self::Error> { Ok(()) }
//!     fn copy_frame(&mut self) -> Result<(), Self::Error> { Ok(()) }
//!     fn is_worker_enabled(&self) -> bool { false }
//!     fn worker_is_idle(&self) -> bool { true }
//!     fn consume_reset_flag(&mut self) -> bool { false }
//!     fn resync_after_reset(&mut self, _brightness: u8) -> Result<(), Self::Error> { Ok(()) }
//!     fn reset_epoch(&self) -> u32 { 0 }
//! }
//! ```

use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

type LinkResult<E> = core::result::Result<(), E>;

/// Watchdog half of the link
///
/// Split out because it is called from the watchdog feed task, concurrently
/// with the update cycle. Implementations must be safe to call from that
/// context.
pub trait WatchdogLink {
    /// Keep the remote controller's watchdog from firing
    fn feed_watchdog(&self);
}

/// Connection to the remote matrix controller
///
/// ## Implementing
///
/// Wrap whatever transfer stack drives the controller. All rectangle
/// payloads are packed RGB, 3 bytes per pixel, row-major within the
/// rectangle.
pub trait DeviceLink: WatchdogLink {
    /// Error type for link operations
    ///
    /// Must implement [`Debug`] for error reporting.
    type Error: Debug;

    /// Bring up the transfer channel and the remote controller
    ///
    /// # Errors
    ///
    /// Returns an error if the controller cannot be initialized.
    fn begin(&mut self) -> LinkResult<Self::Error>;

    /// Blank the visible frame
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    fn clear_screen(&mut self) -> LinkResult<Self::Error>;

    /// Set panel brightness
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    fn set_brightness8(&mut self, level: u8) -> LinkResult<Self::Error>;

    /// Write a packed RGB rectangle from caller-owned memory
    ///
    /// `buffer` holds at least `byte_count` bytes (`w * h * 3`). When a
    /// background worker is enabled the call may return before the payload
    /// has been consumed; see the module docs.
    ///
    /// # Errors
    ///
    /// Returns an error if the rectangle cannot be queued or sent.
    #[allow(clippy::too_many_arguments, clippy::many_single_char_names)]
    fn draw_rect_prealloc(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        buffer: &[u8],
        byte_count: usize,
    ) -> LinkResult<Self::Error>;

    /// Expose the newly written back frame
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    fn swap_frame(&mut self) -> LinkResult<Self::Error>;

    /// Propagate the visible frame into the back frame
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent.
    fn copy_frame(&mut self) -> LinkResult<Self::Error>;

    /// Whether transfers run on a background worker
    fn is_worker_enabled(&self) -> bool;

    /// Whether the background worker has consumed every queued payload
    fn worker_is_idle(&self) -> bool;

    /// Report an unexpected remote reset
    ///
    /// Edge-triggered: returns true at most once per reset event.
    fn consume_reset_flag(&mut self) -> bool;

    /// Restore remote state lost in a reset
    ///
    /// # Errors
    ///
    /// Returns an error if the controller cannot be reconfigured.
    fn resync_after_reset(&mut self, brightness: u8) -> LinkResult<Self::Error>;

    /// Number of remote resets observed so far
    fn reset_epoch(&self) -> u32;

    /// Wait until the background worker is idle
    ///
    /// Returns immediately when no worker is enabled. Otherwise polls
    /// [`worker_is_idle`](Self::worker_is_idle), handing the processor to
    /// other tasks through `delay` between polls. Returns the number of
    /// polls that found the worker busy.
    fn wait_idle<D: DelayNs>(&self, delay: &mut D, poll_interval_us: u32) -> u32 {
        if !self.is_worker_enabled() {
            return 0;
        }
        let mut busy_polls = 0u32;
        while !self.worker_is_idle() {
            delay.delay_us(poll_interval_us);
            busy_polls = busy_polls.saturating_add(1);
        }
        busy_polls
    }
}
