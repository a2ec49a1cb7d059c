//! Display configuration types and builder

use crate::color::BYTES_PER_PIXEL;
pub use crate::error::BuilderError;

/// Default width of a dirty-tracking chunk in columns
pub const DEFAULT_CHUNK_WIDTH: u16 = 32;
/// Default brightness applied during setup
pub const DEFAULT_BRIGHTNESS: u8 = 128;
/// Default watchdog feed interval in microseconds
pub const DEFAULT_WATCHDOG_INTERVAL_US: u32 = 1_000_000;
/// Default pause between worker idle polls in microseconds
pub const DEFAULT_IDLE_POLL_US: u32 = 100;
/// Default update cycle period in milliseconds
pub const DEFAULT_UPDATE_INTERVAL_MS: u32 = 16;

/// Geometry of the chained panel matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Width of a single panel in pixels
    pub panel_width: u16,
    /// Height of a single panel in pixels
    pub panel_height: u16,
    /// Number of panels chained horizontally
    pub chain_length: u16,
}

impl Geometry {
    /// Create a new geometry with validation
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidGeometry` if any value is zero or the
    /// chained width does not fit in a `u16` (rectangle coordinates on the
    /// link are 16 bit).
    pub fn new(panel_width: u16, panel_height: u16, chain_length: u16) -> Result<Self, BuilderError> {
        let invalid = BuilderError::InvalidGeometry {
            panel_width,
            panel_height,
            chain_length,
        };
        if panel_width == 0 || panel_height == 0 || chain_length == 0 {
            return Err(invalid);
        }
        if panel_width.checked_mul(chain_length).is_none() {
            return Err(invalid);
        }
        Ok(Self {
            panel_width,
            panel_height,
            chain_length,
        })
    }

    /// Total width in pixels (`panel_width * chain_length`)
    pub fn width(&self) -> usize {
        self.panel_width as usize * self.chain_length as usize
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.panel_height as usize
    }

    /// Framebuffer size in bytes
    pub fn buffer_size(&self) -> usize {
        self.width() * self.height() * BYTES_PER_PIXEL
    }

    /// Number of chunks of `chunk_width` columns covering the full width
    pub fn chunk_count(&self, chunk_width: u16) -> usize {
        self.width().div_ceil(usize::from(chunk_width.max(1)))
    }

    /// Size in bytes of the largest chunk payload
    pub fn scratch_size(&self, chunk_width: u16) -> usize {
        usize::from(chunk_width).min(self.width()) * self.height() * BYTES_PER_PIXEL
    }
}

/// Panel mirroring relative to logical coordinates
///
/// Some panel chains are wired right-to-left or upside down. Mirroring is
/// applied before pixels are stored, so dirty tracking and transfers always
/// work in physical columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mirror {
    /// No mirroring
    #[default]
    None,
    /// Flip along the vertical axis (x becomes `width - 1 - x`)
    Horizontal,
    /// Flip along the horizontal axis (y becomes `height - 1 - y`)
    Vertical,
    /// Flip both axes
    Both,
}

impl Mirror {
    /// Whether the x axis is flipped
    pub const fn flips_x(self) -> bool {
        matches!(self, Self::Horizontal | Self::Both)
    }

    /// Whether the y axis is flipped
    pub const fn flips_y(self) -> bool {
        matches!(self, Self::Vertical | Self::Both)
    }
}

/// Display configuration
///
/// Use [`Builder`] to create a Config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Panel geometry
    pub geometry: Geometry,
    /// Width of a dirty-tracking chunk in columns
    pub chunk_width: u16,
    /// Brightness applied during setup
    pub initial_brightness: u8,
    /// Panel mirroring
    pub mirror: Mirror,
    /// Whether the remote watchdog should be fed
    pub use_watchdog: bool,
    /// Watchdog feed interval in microseconds
    pub watchdog_interval_us: u32,
    /// Pause between worker idle polls in microseconds
    pub idle_poll_us: u32,
    /// Update cycle period in milliseconds
    pub update_interval_ms: u32,
    /// Upper bound on bytes allocated for buffers at setup, if any
    pub buffer_budget: Option<usize>,
}

impl Config {
    /// Number of dirty-tracking chunks
    pub fn chunk_count(&self) -> usize {
        self.geometry.chunk_count(self.chunk_width)
    }

    /// Size of the scratch transfer buffer in bytes
    pub fn scratch_size(&self) -> usize {
        self.geometry.scratch_size(self.chunk_width)
    }

    /// Bytes allocated at setup: framebuffer, scratch buffer and chunk flags
    pub fn allocation_size(&self) -> usize {
        self.geometry.buffer_size() + self.scratch_size() + self.chunk_count()
    }

    /// Minimum refresh rate the remote controller must sustain, in Hz
    ///
    /// Derived from the update interval so the controller never refreshes
    /// slower than frames are produced.
    pub fn min_refresh_rate(&self) -> u32 {
        1000 / self.update_interval_ms.max(1)
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```
/// use fpga_matrix_display::{Builder, Geometry, Mirror};
///
/// let geometry = match Geometry::new(64, 32, 2) {
///     Ok(geometry) => geometry,
///     Err(_) => return,
/// };
/// let config = match Builder::new().geometry(geometry).mirror(Mirror::Horizontal).build() {
///     Ok(config) => config,
///     Err(_) => return,
/// };
/// assert_eq!(config.chunk_count(), 4);
/// ```
#[must_use]
pub struct Builder {
    geometry: Option<Geometry>,
    chunk_width: u16,
    initial_brightness: u8,
    mirror: Mirror,
    use_watchdog: bool,
    watchdog_interval_us: u32,
    idle_poll_us: u32,
    update_interval_ms: u32,
    buffer_budget: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            geometry: None,
            chunk_width: DEFAULT_CHUNK_WIDTH,
            initial_brightness: DEFAULT_BRIGHTNESS,
            mirror: Mirror::None,
            use_watchdog: true,
            watchdog_interval_us: DEFAULT_WATCHDOG_INTERVAL_US,
            idle_poll_us: DEFAULT_IDLE_POLL_US,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            buffer_budget: None,
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set panel geometry (required)
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Set the chunk width in columns
    pub fn chunk_width(mut self, columns: u16) -> Self {
        self.chunk_width = columns;
        self
    }

    /// Set the brightness applied during setup
    pub fn initial_brightness(mut self, level: u8) -> Self {
        self.initial_brightness = level;
        self
    }

    /// Set panel mirroring
    pub fn mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = mirror;
        self
    }

    /// Enable or disable feeding the remote watchdog
    pub fn use_watchdog(mut self, enabled: bool) -> Self {
        self.use_watchdog = enabled;
        self
    }

    /// Set the watchdog feed interval in microseconds
    pub fn watchdog_interval_us(mut self, interval: u32) -> Self {
        self.watchdog_interval_us = interval;
        self
    }

    /// Set the pause between worker idle polls in microseconds
    pub fn idle_poll_us(mut self, interval: u32) -> Self {
        self.idle_poll_us = interval;
        self
    }

    /// Set the update cycle period in milliseconds
    pub fn update_interval_ms(mut self, interval: u32) -> Self {
        self.update_interval_ms = interval;
        self
    }

    /// Limit the memory the driver may allocate for its buffers
    ///
    /// Setup treats a geometry that needs more than `bytes` like an
    /// allocation failure. Useful on targets where the buffers must fit a
    /// dedicated memory region.
    pub fn buffer_budget(mut self, bytes: usize) -> Self {
        self.buffer_budget = Some(bytes);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// - `BuilderError::MissingGeometry` if geometry was not set
    /// - `BuilderError::InvalidChunkWidth` if the chunk width is zero
    /// - `BuilderError::InvalidInterval` if the watchdog is enabled with a
    ///   zero interval, or the update interval is zero
    pub fn build(self) -> Result<Config, BuilderError> {
        let geometry = self.geometry.ok_or(BuilderError::MissingGeometry)?;
        if self.chunk_width == 0 {
            return Err(BuilderError::InvalidChunkWidth(self.chunk_width));
        }
        if self.use_watchdog && self.watchdog_interval_us == 0 {
            return Err(BuilderError::InvalidInterval("watchdog_interval_us"));
        }
        if self.update_interval_ms == 0 {
            return Err(BuilderError::InvalidInterval("update_interval_ms"));
        }
        Ok(Config {
            geometry,
            chunk_width: self.chunk_width,
            initial_brightness: self.initial_brightness,
            mirror: self.mirror,
            use_watchdog: self.use_watchdog,
            watchdog_interval_us: self.watchdog_interval_us,
            idle_poll_us: self.idle_poll_us,
            update_interval_ms: self.update_interval_ms,
            buffer_budget: self.buffer_budget,
        })
    }
}
