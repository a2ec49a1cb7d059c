//! Remote watchdog feeding
//!
//! The matrix controller resets itself if it is not fed periodically. The
//! feed is decoupled from the update cycle so it keeps going while updates
//! are slow or the display is switched off.
//!
//! [`WatchdogFeeder`] splits the work in two:
//!
//! - a periodic timer calls [`on_timer`](WatchdogFeeder::on_timer), which
//!   only posts a feed request (safe from interrupt context)
//! - a single-purpose feed task calls [`service`](WatchdogFeeder::service),
//!   which consumes the request and feeds the link once
//!
//! ## Example
//!
//! ```
//! use core::cell::Cell;
//! use fpga_matrix_display::{WatchdogFeeder, WatchdogLink};
//!
//! struct Counter(Cell<u32>);
//! impl WatchdogLink for Counter {
//!     fn feed_watchdog(&self) {
//!         self.0.set(self.0.get() + 1);
//!     }
//! }
//!
//! static FEEDER: WatchdogFeeder = WatchdogFeeder::new(1_000_000);
//!
//! let link = Counter(Cell::new(0));
//! FEEDER.start();
//! FEEDER.on_timer(); // timer context
//! FEEDER.service(&link); // feed task
//! assert_eq!(link.0.get(), 1);
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::Config;
use crate::link::WatchdogLink;

/// Hands watchdog feed requests from a timer to a feed task
#[derive(Debug)]
pub struct WatchdogFeeder {
    interval_us: u32,
    armed: AtomicBool,
    pending: AtomicBool,
    fed: AtomicU32,
    coalesced: AtomicU32,
}

impl WatchdogFeeder {
    /// Create a disarmed feeder for a timer firing every `interval_us`
    pub const fn new(interval_us: u32) -> Self {
        Self {
            interval_us,
            armed: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            fed: AtomicU32::new(0),
            coalesced: AtomicU32::new(0),
        }
    }

    /// Feeder for the configured interval, or `None` if the watchdog is off
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .use_watchdog
            .then(|| Self::new(config.watchdog_interval_us))
    }

    /// Interval the timer should be programmed with, in microseconds
    pub fn interval_us(&self) -> u32 {
        self.interval_us
    }

    /// Arm the feeder; timer firings post requests from now on
    pub fn start(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Disarm the feeder and drop any unserviced request
    pub fn stop(&self) {
        self.armed.store(false, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    /// Whether the feeder is armed
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Timer callback: post a feed request
    ///
    /// Lock-free and allocation-free. A request posted while the previous
    /// one is still pending is merged into it. Returns whether a request
    /// was posted.
    pub fn on_timer(&self) -> bool {
        if !self.is_armed() {
            return false;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Feed task: feed the link once if a request is pending
    ///
    /// Returns whether the link was fed.
    pub fn service<W: WatchdogLink + ?Sized>(&self, link: &W) -> bool {
        if !self.pending.swap(false, Ordering::AcqRel) {
            return false;
        }
        link.feed_watchdog();
        self.fed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Number of feeds performed
    pub fn feed_count(&self) -> u32 {
        self.fed.load(Ordering::Relaxed)
    }

    /// Number of timer firings merged into an already pending request
    pub fn coalesced_count(&self) -> u32 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
