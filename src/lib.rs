//! FPGA RGB LED Matrix Display Driver
//!
//! A host-side driver for chained HUB75-style RGB LED panels whose scanning
//! is done by an FPGA matrix controller. The host keeps a full RGB
//! framebuffer and sends only the column chunks that changed since the last
//! frame, one chunk at a time, through a single preallocated transfer
//! buffer.
//!
//! ## Features
//!
//! - `no_std` compatible (buffers are allocated once with `alloc`)
//! - `embedded-hal` v1.0 delays for cooperative idle waits
//! - `embedded-graphics` integration (with `graphics` feature)
//! - Dirty chunk tracking, so unchanged columns are never resent
//! - Recovery from remote controller resets
//! - Lock-free watchdog feeding from a timer
//! - Color bar test pattern
//! - Horizontal and vertical mirroring
//!
//! ## Usage
//!
//! ```
//! use fpga_matrix_display::{
//!     Builder, DeviceLink, DisplayDriver, Geometry, Mirror, Rgb, WatchdogLink,
//! };
//!
//! # #[derive(Debug)]
//! # struct SpiLink;
//! # impl WatchdogLink for SpiLink {
//! #     fn feed_watchdog(&self) {}
//! # }
//! # impl DeviceLink for SpiLink {
//! #     type Error = core::convert::Infallible;
//! #     fn begin(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn clear_screen(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_brightness8(&mut self, _: u8) -> Result<(), Self::Error> { Ok(()) }
//! #     fn draw_rect_prealloc(&mut self, _: u16, _: u16, _: u16, _: u16, _: &[u8], _: usize) -> Result<(), Self::Error> { Ok(()) }
//! #     fn swap_frame(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn copy_frame(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn is_worker_enabled(&self) -> bool { false }
//! #     fn worker_is_idle(&self) -> bool { true }
//! #     fn consume_reset_flag(&mut self) -> bool { false }
//! #     fn resync_after_reset(&mut self, _: u8) -> Result<(), Self::Error> { Ok(()) }
//! #     fn reset_epoch(&self) -> u32 { 0 }
//! # }
//! # struct MockDelay;
//! # impl embedded_hal::delay::DelayNs for MockDelay { fn delay_ns(&mut self, _ns: u32) {} }
//! # let mut delay = MockDelay;
//! let geometry = match Geometry::new(64, 32, 2) {
//!     Ok(geometry) => geometry,
//!     Err(_) => return,
//! };
//! let config = match Builder::new()
//!     .geometry(geometry)
//!     .mirror(Mirror::Horizontal)
//!     .initial_brightness(96)
//!     .build()
//! {
//!     Ok(config) => config,
//!     Err(_) => return,
//! };
//!
//! let mut display = DisplayDriver::new(SpiLink, config);
//! let _ = display.setup();
//!
//! // Once per frame period
//! let _ = display.update_with(&mut delay, |frame| {
//!     frame.fill_rect(0, 0, 16, 16, Rgb::BLUE);
//! });
//! ```

#![no_std]

extern crate alloc;

/// RGB color type and test pattern colors
pub mod color;
/// Display configuration types and builder
pub mod config;
/// Per-chunk dirty tracking
pub mod dirty;
/// Top-level display driver
pub mod display;
/// Error types for the driver
pub mod error;
/// Chunked flush protocol
pub mod flush;
/// Host-side RGB framebuffer
pub mod framebuffer;
/// Remote controller link abstraction
pub mod link;
/// Coordinate mirroring utilities
pub mod mirror;
/// Remote reset recovery
pub mod recovery;
/// Preallocated transfer buffer
pub mod scratch;
/// Remote watchdog feeding
pub mod watchdog;

/// Graphics support via embedded-graphics (requires `graphics` feature)
#[cfg(feature = "graphics")]
pub mod graphics;

#[cfg(test)]
mod testing;

pub use color::Rgb;
pub use config::{Builder, Config, Geometry, Mirror};
pub use dirty::DirtyChunkMap;
pub use display::{
    BrightnessListener, DisplayDriver, DriverState, DriverStats, PowerSwitchListener,
};
pub use error::{AllocError, BuilderError, Error};
pub use flush::{FlushEngine, FlushReport, FlushStats};
pub use framebuffer::{FrameBuffer, PixelSink};
pub use link::{DeviceLink, WatchdogLink};
pub use recovery::ResetRecoveryMonitor;
pub use scratch::ScratchTransferBuffer;
pub use watchdog::WatchdogFeeder;
