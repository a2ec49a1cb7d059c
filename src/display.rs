//! Top-level display driver

use alloc::boxed::Box;
use alloc::vec::Vec;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::color::color_bar;
use crate::config::Config;
use crate::error::{AllocError, Error};
use crate::flush::{FlushEngine, FlushStats};
use crate::framebuffer::FrameBuffer;
use crate::link::DeviceLink;
use crate::recovery::ResetRecoveryMonitor;
use crate::scratch::ScratchTransferBuffer;
use crate::watchdog::WatchdogFeeder;

type DriverResult<L> = core::result::Result<(), Error<L>>;

/// Receives the display's on/off state
pub trait PowerSwitchListener {
    /// Called with the new state whenever the display is switched
    fn publish_state(&mut self, enabled: bool);
}

/// Receives the display's brightness
pub trait BrightnessListener {
    /// Called with the new level whenever brightness is set
    fn publish_brightness(&mut self, level: u8);
}

/// Lifecycle state of the driver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverState {
    /// `setup` has not run yet
    #[default]
    Uninitialized,
    /// Buffers allocated, frames are flushed while enabled
    Ready,
    /// Buffer allocation failed; the driver only clears the remote screen
    Failed,
}

/// Snapshot of the driver's counters
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriverStats {
    /// Update cycles run since setup
    pub update_cycles: u32,
    /// Remote resets recovered from
    pub recoveries: u32,
    /// Reset epoch currently reported by the link
    pub reset_epoch: u32,
    /// Flush statistics (all zero if the buffers were never allocated)
    pub flush: FlushStats,
}

struct Surfaces {
    frame: FrameBuffer,
    engine: FlushEngine,
}

impl Surfaces {
    fn allocate(config: &Config) -> Result<Self, AllocError> {
        let requested = config.allocation_size();
        if config.buffer_budget.is_some_and(|budget| requested > budget) {
            return Err(AllocError { requested });
        }
        let frame = FrameBuffer::new(config)?;
        let scratch = ScratchTransferBuffer::allocate(config.scratch_size())?;
        Ok(Self {
            frame,
            engine: FlushEngine::new(scratch, config.idle_poll_us),
        })
    }
}

/// Driver for an FPGA-driven RGB LED matrix
///
/// Owns the link, the framebuffer and the flush machinery. Call
/// [`setup`](Self::setup) once, then [`update`](Self::update) (or
/// [`update_with`](Self::update_with)) once per frame period.
///
/// ## Example
///
/// ```
/// # use fpga_matrix_display::{Builder, DeviceLink, DisplayDriver, Geometry, Rgb, WatchdogLink};
/// # #[derive(Debug)]
/// # struct NullLink;
/// # impl WatchdogLink for NullLink {
/// #     fn feed_watchdog(&self) {}
/// # }
/// # impl DeviceLink for NullLink {
/// #     type Error = ();
/// #     fn begin(&mut self) -> Result<(), ()> { Ok(()) }
/// #     fn clear_screen(&mut self) -> Result<(), ()> { Ok(()) }
/// #     fn set_brightness8(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
/// #     fn draw_rect_prealloc(&mut self, _: u16, _: u16, _: u16, _: u16, _: &[u8], _: usize) -> Result<(), ()> { Ok(()) }
/// #     fn swap_frame(&mut self) -> Result<(), ()> { Ok(()) }
/// #     fn copy_frame(&mut self) -> Result<(), ()> { Ok(()) }
/// #     fn is_worker_enabled(&self) -> bool { false }
/// #     fn worker_is_idle(&self) -> bool { true }
/// #     fn consume_reset_flag(&mut self) -> bool { false }
/// #     fn resync_after_reset(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
/// #     fn reset_epoch(&self) -> u32 { 0 }
/// # }
/// # struct NoDelay;
/// # impl embedded_hal::delay::DelayNs for NoDelay {
/// #     fn delay_ns(&mut self, _: u32) {}
/// # }
/// # fn main() -> Result<(), fpga_matrix_display::Error<NullLink>> {
/// # let Ok(geometry) = Geometry::new(64, 32, 2) else { return Ok(()) };
/// # let Ok(config) = Builder::new().geometry(geometry).build() else { return Ok(()) };
/// # let mut delay = NoDelay;
/// let mut driver = DisplayDriver::new(NullLink, config);
/// driver.setup()?;
///
/// driver.update_with(&mut delay, |frame| {
///     frame.write_pixel(10, 5, Rgb::RED);
/// })?;
/// assert_eq!(driver.stats().flush.chunks_sent, 4);
/// # Ok(())
/// # }
/// ```
pub struct DisplayDriver<L>
where
    L: DeviceLink,
{
    /// Transport to the matrix controller
    link: L,
    /// Display configuration
    config: Config,
    state: DriverState,
    /// `None` until setup succeeds
    surfaces: Option<Surfaces>,
    enabled: bool,
    brightness: u8,
    test_mode: bool,
    test_pattern_sent: bool,
    recovery: ResetRecoveryMonitor,
    /// `None` when the remote watchdog is not used
    watchdog: Option<WatchdogFeeder>,
    update_cycles: u32,
    power_switches: Vec<Box<dyn PowerSwitchListener>>,
    brightness_listeners: Vec<Box<dyn BrightnessListener>>,
}

impl<L> DisplayDriver<L>
where
    L: DeviceLink,
{
    /// Create a new driver; nothing is sent or allocated until `setup`
    pub fn new(link: L, config: Config) -> Self {
        let brightness = config.initial_brightness;
        let watchdog = WatchdogFeeder::from_config(&config);
        Self {
            link,
            config,
            state: DriverState::Uninitialized,
            surfaces: None,
            enabled: false,
            brightness,
            test_mode: false,
            test_pattern_sent: false,
            recovery: ResetRecoveryMonitor::new(),
            watchdog,
            update_cycles: 0,
            power_switches: Vec::new(),
            brightness_listeners: Vec::new(),
        }
    }

    /// Register a listener for the on/off state
    ///
    /// With at least one listener registered before `setup`, the display
    /// starts switched off and waits for [`set_state`](Self::set_state).
    pub fn register_power_switch(&mut self, listener: Box<dyn PowerSwitchListener>) {
        self.power_switches.push(listener);
    }

    /// Register a listener for brightness changes
    pub fn register_brightness(&mut self, listener: Box<dyn BrightnessListener>) {
        self.brightness_listeners.push(listener);
    }

    /// Start the link, allocate buffers and blank the remote screen
    ///
    /// Calling `setup` again after it has run is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::Link`] if a link call fails
    /// - [`Error::Allocation`] if the buffers cannot be allocated. The
    ///   driver is still set up, but stays off and only clears the screen.
    pub fn setup(&mut self) -> DriverResult<L> {
        if self.state != DriverState::Uninitialized {
            debug!("Matrix display already set up");
            return Ok(());
        }

        info!("Setting up matrix display");
        self.link.begin().map_err(Error::Link)?;

        let failure = match Surfaces::allocate(&self.config) {
            Ok(surfaces) => {
                self.surfaces = Some(surfaces);
                self.state = DriverState::Ready;
                None
            }
            Err(err) => {
                error!("Matrix display disabled: {err}");
                self.state = DriverState::Failed;
                Some(err)
            }
        };

        self.set_brightness(i32::from(self.config.initial_brightness))?;
        self.link.clear_screen().map_err(Error::Link)?;

        if let Some(watchdog) = &self.watchdog {
            watchdog.start();
            info!("Feeding remote watchdog every {} us", watchdog.interval_us());
        }

        if let Some(err) = failure {
            self.set_state(false);
            return Err(err.into());
        }
        self.set_state(self.power_switches.is_empty());
        Ok(())
    }

    /// Run one update cycle without drawing
    ///
    /// # Errors
    ///
    /// See [`update_with`](Self::update_with).
    pub fn update<D: DelayNs>(&mut self, delay: &mut D) -> DriverResult<L> {
        self.update_with(delay, |_| {})
    }

    /// Run one update cycle
    ///
    /// A pending watchdog feed request is serviced and a remote reset is
    /// handled first. In test mode the test pattern is then (re)sent if
    /// needed and nothing else happens; a reset resends it. While enabled, `draw` gets the framebuffer and the dirty chunks are
    /// flushed afterwards; while disabled the remote screen is cleared and
    /// `draw` is not called.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if `setup` has not run
    /// - [`Error::ChunkTooLarge`] or [`Error::Link`] if the flush stopped
    ///   early; the remaining chunks are retried next cycle
    pub fn update_with<D, F>(&mut self, delay: &mut D, draw: F) -> DriverResult<L>
    where
        D: DelayNs,
        F: FnOnce(&mut FrameBuffer),
    {
        if self.state == DriverState::Uninitialized {
            return Err(Error::NotReady);
        }
        self.update_cycles = self.update_cycles.wrapping_add(1);
        self.service_watchdog();

        let dirty = self.surfaces.as_mut().map(|s| s.frame.dirty_mut());
        let reset = self.recovery.check(&mut self.link, self.brightness, dirty);

        if self.test_mode {
            if reset {
                self.test_pattern_sent = false;
            }
            return self.run_test_sequence(delay);
        }

        let surfaces = match self.surfaces.as_mut() {
            Some(surfaces) if self.enabled => surfaces,
            _ => return self.link.clear_screen().map_err(Error::Link),
        };

        draw(&mut surfaces.frame);
        surfaces
            .engine
            .flush(&mut surfaces.frame, &mut self.link, delay)?;
        Ok(())
    }

    /// Switch the display on or off
    ///
    /// Switching on marks the whole frame dirty, since the remote screen
    /// was blanked while off. A driver whose setup failed stays off.
    pub fn set_state(&mut self, enabled: bool) {
        let enabled = if enabled && self.state == DriverState::Failed {
            warn!("Matrix display has no buffers, staying off");
            false
        } else {
            enabled
        };

        if enabled && !self.enabled {
            if let Some(surfaces) = self.surfaces.as_mut() {
                surfaces.frame.dirty_mut().mark_all();
            }
        }
        self.enabled = enabled;
        debug!("Matrix display {}", if enabled { "on" } else { "off" });

        for listener in &mut self.power_switches {
            listener.publish_state(enabled);
        }
    }

    /// Whether frames are currently being flushed
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set brightness, clamping `level` to `0..=255`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Link`] if the link rejects the new level. The level
    /// is stored and listeners are notified regardless.
    pub fn set_brightness(&mut self, level: i32) -> DriverResult<L> {
        let level = clamp_brightness(level);
        self.brightness = level;
        for listener in &mut self.brightness_listeners {
            listener.publish_brightness(level);
        }
        self.link.set_brightness8(level).map_err(Error::Link)
    }

    /// Set brightness from a light output fraction in `0.0..=1.0`
    ///
    /// # Errors
    ///
    /// See [`set_brightness`](Self::set_brightness).
    pub fn set_brightness_fraction(&mut self, value: f32) -> DriverResult<L> {
        #[allow(clippy::cast_possible_truncation)]
        let level = (value.clamp(0.0, 1.0) * 255.0 + 0.5) as i32;
        self.set_brightness(level)
    }

    /// Current brightness level
    pub fn current_brightness(&self) -> u8 {
        self.brightness
    }

    /// Enter test mode and send the color bar pattern
    ///
    /// While test mode is active, update cycles neither flush nor clear.
    /// Entering again while active sends nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if the buffers were never allocated; test
    ///   mode is not entered
    /// - [`Error::ChunkTooLarge`] or [`Error::Link`] if sending the pattern
    ///   failed; the next update cycle tries again
    pub fn enter_test_state<D: DelayNs>(&mut self, delay: &mut D) -> DriverResult<L> {
        if self.surfaces.is_none() {
            return Err(Error::NotReady);
        }
        if self.test_mode {
            debug!("Test state already active");
            return Ok(());
        }
        info!("Entering test state");
        self.test_mode = true;
        self.test_pattern_sent = false;
        self.run_test_sequence(delay)
    }

    /// Leave test mode; the next update repaints the whole frame
    pub fn exit_test_state(&mut self) {
        if !self.test_mode {
            return;
        }
        info!("Leaving test state");
        self.test_mode = false;
        self.test_pattern_sent = false;
        if let Some(surfaces) = self.surfaces.as_mut() {
            surfaces.frame.dirty_mut().mark_all();
        }
    }

    /// Whether test mode is active
    pub fn is_test_state_active(&self) -> bool {
        self.test_mode
    }

    fn run_test_sequence<D: DelayNs>(&mut self, delay: &mut D) -> DriverResult<L> {
        if self.test_pattern_sent {
            return Ok(());
        }
        let Some(surfaces) = self.surfaces.as_mut() else {
            return Err(Error::NotReady);
        };

        let width = surfaces.frame.width();
        let height = surfaces.frame.height();
        let flip = self.config.mirror.flips_x();
        let sent = surfaces.engine.paint_columns(
            &mut self.link,
            delay,
            width,
            height,
            usize::from(self.config.chunk_width),
            |x| color_bar(if flip { width - 1 - x } else { x }, width),
        )?;
        self.test_pattern_sent = true;
        debug!("Test pattern sent in {sent} chunks");
        Ok(())
    }

    /// Watchdog feeder, if the remote watchdog is used
    ///
    /// The periodic timer calls [`WatchdogFeeder::on_timer`] on it, every
    /// [`WatchdogFeeder::interval_us`].
    pub fn watchdog(&self) -> Option<&WatchdogFeeder> {
        self.watchdog.as_ref()
    }

    /// Feed the remote watchdog if the timer posted a request
    ///
    /// Also run at the start of every update cycle. Returns whether the
    /// link was fed.
    pub fn service_watchdog(&self) -> bool {
        self.watchdog
            .as_ref()
            .is_some_and(|watchdog| watchdog.service(&self.link))
    }

    /// Log the configuration and counters at info level
    pub fn dump_config(&self) {
        let geometry = &self.config.geometry;
        info!("Matrix display:");
        info!(
            "  Panel: {}x{}, chain length {}",
            geometry.panel_width, geometry.panel_height, geometry.chain_length
        );
        info!("  Resolution: {}x{}", geometry.width(), geometry.height());
        info!(
            "  Chunks: {} of {} columns, scratch buffer {} bytes",
            self.config.chunk_count(),
            self.config.chunk_width,
            self.config.scratch_size()
        );
        info!("  Mirror: {:?}", self.config.mirror);
        info!("  Brightness: {}", self.brightness);
        info!("  Min refresh rate: {} Hz", self.config.min_refresh_rate());
        if let Some(watchdog) = &self.watchdog {
            info!(
                "  Watchdog: every {} us, {} feeds, {} merged requests",
                watchdog.interval_us(),
                watchdog.feed_count(),
                watchdog.coalesced_count()
            );
        } else {
            info!("  Watchdog: disabled");
        }
        info!(
            "  State: {:?}, enabled: {}, test mode: {}",
            self.state, self.enabled, self.test_mode
        );

        let stats = self.stats();
        info!(
            "  Flush passes: {} ({} incomplete), {:.2} chunks per pass",
            stats.flush.passes, stats.flush.incomplete_passes, stats.flush.avg_chunks_per_pass
        );
        info!(
            "  Remote resets recovered: {} (epoch {})",
            stats.recoveries, stats.reset_epoch
        );
    }

    /// Counters collected so far
    pub fn stats(&self) -> DriverStats {
        DriverStats {
            update_cycles: self.update_cycles,
            recoveries: self.recovery.recoveries(),
            reset_epoch: self.link.reset_epoch(),
            flush: self
                .surfaces
                .as_ref()
                .map(|s| *s.engine.stats())
                .unwrap_or_default(),
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Display configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Framebuffer, if allocated
    pub fn frame(&self) -> Option<&FrameBuffer> {
        self.surfaces.as_ref().map(|s| &s.frame)
    }

    /// Mutable framebuffer, if allocated
    ///
    /// Drawing here outside [`update_with`](Self::update_with) is fine;
    /// the changes go out with the next update cycle.
    pub fn frame_mut(&mut self) -> Option<&mut FrameBuffer> {
        self.surfaces.as_mut().map(|s| &mut s.frame)
    }

    /// Link reference
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable link reference
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

/// Clamp a requested brightness to the range the link accepts
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_brightness(level: i32) -> u8 {
    level.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::config::{Builder, Geometry, Mirror};
    use crate::testing::{Call, MockDelay, MockLink};
    use alloc::rc::Rc;
    use core::cell::RefCell;

    struct StateLog(Rc<RefCell<Vec<bool>>>);

    impl PowerSwitchListener for StateLog {
        fn publish_state(&mut self, enabled: bool) {
            self.0.borrow_mut().push(enabled);
        }
    }

    struct LevelLog(Rc<RefCell<Vec<u8>>>);

    impl BrightnessListener for LevelLog {
        fn publish_brightness(&mut self, level: u8) {
            self.0.borrow_mut().push(level);
        }
    }

    fn test_config() -> Config {
        Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .initial_brightness(100)
            .build()
            .unwrap()
    }

    fn test_driver() -> DisplayDriver<MockLink> {
        let mut driver = DisplayDriver::new(MockLink::new(), test_config());
        driver.setup().unwrap();
        driver.link_mut().calls.clear();
        driver
    }

    #[test]
    fn test_setup_sequence() {
        let mut driver = DisplayDriver::new(MockLink::new(), test_config());
        assert_eq!(driver.state(), DriverState::Uninitialized);

        driver.setup().unwrap();

        assert_eq!(
            driver.link().calls,
            [Call::Begin, Call::Brightness(100), Call::Clear]
        );
        assert_eq!(driver.state(), DriverState::Ready);
        assert!(driver.is_enabled());
        assert_eq!(driver.current_brightness(), 100);
        assert_eq!(driver.frame().unwrap().dirty().chunk_count(), 4);
    }

    #[test]
    fn test_setup_twice_is_noop() {
        let mut driver = test_driver();
        driver.setup().unwrap();
        assert!(driver.link().calls.is_empty());
    }

    #[test]
    fn test_update_before_setup() {
        let mut driver = DisplayDriver::new(MockLink::new(), test_config());
        let mut delay = MockDelay::default();
        assert!(matches!(driver.update(&mut delay), Err(Error::NotReady)));
        assert!(driver.link().calls.is_empty());
    }

    #[test]
    fn test_first_update_repaints_everything() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();

        driver.update(&mut delay).unwrap();

        assert_eq!(
            driver.link().rects(),
            [(0, 0, 32, 32), (32, 0, 32, 32), (64, 0, 32, 32), (96, 0, 32, 32)]
        );
        assert_eq!(driver.link().count(&Call::Swap), 1);
        assert_eq!(driver.link().count(&Call::Copy), 1);
    }

    #[test]
    fn test_single_pixel_update() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.link_mut().calls.clear();

        driver
            .update_with(&mut delay, |frame| frame.write_pixel(70, 3, Rgb::GREEN))
            .unwrap();

        assert_eq!(driver.link().rects(), [(64, 0, 32, 32)]);
        let bytes = driver.link().rect_bytes(0).unwrap();
        let offset = (3 * 32 + 6) * 3;
        assert_eq!(&bytes[offset..offset + 3], &[0, 255, 0]);

        driver.link_mut().calls.clear();
        driver.update(&mut delay).unwrap();
        assert!(driver.link().calls.is_empty());
    }

    #[test]
    fn test_disabled_display_clears() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.set_state(false);

        let mut drew = false;
        driver.update_with(&mut delay, |_| drew = true).unwrap();

        assert!(!drew);
        assert_eq!(driver.link().calls, [Call::Clear]);
    }

    #[test]
    fn test_reenable_repaints() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.set_state(false);
        driver.update(&mut delay).unwrap();
        driver.link_mut().calls.clear();

        driver.set_state(true);
        driver.update(&mut delay).unwrap();

        assert_eq!(driver.link().rects().len(), 4);
    }

    #[test]
    fn test_brightness_is_clamped() {
        let mut driver = test_driver();

        driver.set_brightness(300).unwrap();
        assert_eq!(driver.current_brightness(), 255);
        driver.set_brightness(-5).unwrap();
        assert_eq!(driver.current_brightness(), 0);
        driver.set_brightness(42).unwrap();

        assert_eq!(
            driver.link().calls,
            [Call::Brightness(255), Call::Brightness(0), Call::Brightness(42)]
        );
    }

    #[test]
    fn test_brightness_fraction() {
        let mut driver = test_driver();
        driver.set_brightness_fraction(0.5).unwrap();
        assert_eq!(driver.current_brightness(), 128);
        driver.set_brightness_fraction(1.5).unwrap();
        assert_eq!(driver.current_brightness(), 255);
        driver.set_brightness_fraction(0.0).unwrap();
        assert_eq!(driver.current_brightness(), 0);
    }

    #[test]
    fn test_listeners_are_notified() {
        let states = Rc::new(RefCell::new(Vec::new()));
        let levels = Rc::new(RefCell::new(Vec::new()));
        let mut driver = DisplayDriver::new(MockLink::new(), test_config());
        driver.register_power_switch(Box::new(StateLog(states.clone())));
        driver.register_brightness(Box::new(LevelLog(levels.clone())));

        driver.setup().unwrap();
        assert!(!driver.is_enabled());

        driver.set_state(true);
        driver.set_brightness(7).unwrap();

        assert_eq!(*states.borrow(), [false, true]);
        assert_eq!(*levels.borrow(), [100, 7]);
    }

    #[test]
    fn test_allocation_failure_degrades_to_clear_only() {
        let config = Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .buffer_budget(1024)
            .build()
            .unwrap();
        let mut driver = DisplayDriver::new(MockLink::new(), config);
        let mut delay = MockDelay::default();

        assert!(matches!(
            driver.setup(),
            Err(Error::Allocation { requested }) if requested > 1024
        ));
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(!driver.is_enabled());
        assert!(driver.frame().is_none());

        driver.set_state(true);
        assert!(!driver.is_enabled());

        driver.link_mut().calls.clear();
        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().calls, [Call::Clear]);

        assert!(matches!(
            driver.enter_test_state(&mut delay),
            Err(Error::NotReady)
        ));
    }

    #[test]
    fn test_failed_driver_refuses_test_mode_and_keeps_clearing() {
        let config = Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .buffer_budget(1024)
            .build()
            .unwrap();
        let mut driver = DisplayDriver::new(MockLink::new(), config);
        let mut delay = MockDelay::default();
        assert!(driver.setup().is_err());

        assert!(matches!(
            driver.enter_test_state(&mut delay),
            Err(Error::NotReady)
        ));
        assert!(!driver.is_test_state_active());

        driver.link_mut().calls.clear();
        driver.update(&mut delay).unwrap();
        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().calls, [Call::Clear, Call::Clear]);
    }

    #[test]
    fn test_setup_arms_watchdog() {
        let mut driver = DisplayDriver::new(MockLink::new(), test_config());
        assert!(!driver.watchdog().unwrap().is_armed());

        driver.setup().unwrap();
        let watchdog = driver.watchdog().unwrap();
        assert!(watchdog.is_armed());
        assert_eq!(watchdog.interval_us(), 1_000_000);

        assert!(watchdog.on_timer());
        assert!(driver.service_watchdog());
        assert!(!driver.service_watchdog());
        assert_eq!(driver.link().feeds.get(), 1);
    }

    #[test]
    fn test_update_services_pending_feed() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();

        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().feeds.get(), 0);

        driver.watchdog().unwrap().on_timer();
        driver.update(&mut delay).unwrap();
        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().feeds.get(), 1);
    }

    #[test]
    fn test_watchdog_disabled() {
        let config = Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .use_watchdog(false)
            .build()
            .unwrap();
        let mut driver = DisplayDriver::new(MockLink::new(), config);
        driver.setup().unwrap();
        assert!(driver.watchdog().is_none());
        assert!(!driver.service_watchdog());
    }

    #[test]
    fn test_failed_resync_retried_next_cycle() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.link_mut().calls.clear();

        driver.link_mut().fail_resyncs = 1;
        driver.link_mut().trigger_reset();
        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().count(&Call::Resync(100)), 0);
        assert_eq!(driver.link().rects().len(), 4);

        driver.update(&mut delay).unwrap();
        assert_eq!(driver.link().count(&Call::Resync(100)), 1);
    }

    #[test]
    fn test_reset_in_test_mode_resends_pattern() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.enter_test_state(&mut delay).unwrap();
        driver.link_mut().calls.clear();

        driver.link_mut().trigger_reset();
        driver.update(&mut delay).unwrap();

        assert_eq!(driver.link().calls[0], Call::Resync(100));
        assert_eq!(driver.link().rects().len(), 4);
        assert_eq!(&driver.link().rect_bytes(0).unwrap()[..3], &[255, 255, 255]);

        driver.link_mut().calls.clear();
        driver.update(&mut delay).unwrap();
        assert!(driver.link().calls.is_empty());
    }

    #[test]
    fn test_reset_is_resynced_and_repainted() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.set_brightness(60).unwrap();
        driver.link_mut().calls.clear();

        driver.link_mut().trigger_reset();
        driver.update(&mut delay).unwrap();

        assert_eq!(driver.link().calls[0], Call::Resync(60));
        assert_eq!(driver.link().rects().len(), 4);
        let stats = driver.stats();
        assert_eq!(stats.recoveries, 1);
        assert_eq!(stats.reset_epoch, 1);
    }

    #[test]
    fn test_test_mode_sends_pattern_once() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.frame_mut().unwrap().write_pixel(0, 0, Rgb::RED);

        driver.enter_test_state(&mut delay).unwrap();
        assert!(driver.is_test_state_active());
        assert_eq!(driver.link().rects().len(), 4);
        let first = driver.link().rect_bytes(0).unwrap();
        assert_eq!(&first[..3], &[255, 255, 255]);

        driver.link_mut().calls.clear();
        driver.enter_test_state(&mut delay).unwrap();
        driver.update(&mut delay).unwrap();
        assert!(driver.link().calls.is_empty());

        // Framebuffer untouched, still waiting to be flushed
        let frame = driver.frame().unwrap();
        assert_eq!(frame.pixel(0, 0), Some(Rgb::RED));
        assert!(frame.dirty().any_dirty());
    }

    #[test]
    fn test_exit_test_mode_repaints_frame() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.enter_test_state(&mut delay).unwrap();
        driver.link_mut().calls.clear();

        driver.exit_test_state();
        assert!(!driver.is_test_state_active());
        driver.update(&mut delay).unwrap();

        assert_eq!(driver.link().rects().len(), 4);
        assert_eq!(driver.link().rect_bytes(0).unwrap()[..3], [0, 0, 0]);
    }

    #[test]
    fn test_mirrored_test_pattern_reads_left_to_right() {
        let config = Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .mirror(Mirror::Horizontal)
            .build()
            .unwrap();
        let mut driver = DisplayDriver::new(MockLink::new(), config);
        let mut delay = MockDelay::default();
        driver.setup().unwrap();

        driver.enter_test_state(&mut delay).unwrap();

        // Physical column 0 shows the logical right edge
        let first = driver.link().rect_bytes(0).unwrap();
        assert_eq!(&first[..3], &[0, 0, 0]);
    }

    #[test]
    fn test_stats_count_cycles() {
        let mut driver = test_driver();
        let mut delay = MockDelay::default();
        driver.update(&mut delay).unwrap();
        driver.update(&mut delay).unwrap();

        let stats = driver.stats();
        assert_eq!(stats.update_cycles, 2);
        assert_eq!(stats.flush.passes, 1);
        assert_eq!(stats.flush.chunks_sent, 4);
        driver.dump_config();
    }
}
