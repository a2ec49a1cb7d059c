//! Color type for RGB matrix panels
//!
//! This module defines the [`Rgb`] triple stored by the framebuffer and
//! the color bars used by the panel test pattern.
//!
//! ## Color Representation
//!
//! Each pixel is stored as three consecutive bytes in the framebuffer and
//! in every transfer payload:
//!
//! | Offset | Channel |
//! |--------|---------|
//! | 0      | Red     |
//! | 1      | Green   |
//! | 2      | Blue    |
//!
//! ## Example
//!
//! ```
//! use fpga_matrix_display::Rgb;
//!
//! let orange = Rgb::new(0xFF, 0x80, 0x00);
//! assert_eq!(orange.to_bytes(), [0xFF, 0x80, 0x00]);
//! assert_eq!(Rgb::from_bytes([0, 0, 0xFF]), Rgb::BLUE);
//! ```

/// Number of bytes a single pixel occupies in the framebuffer
pub const BYTES_PER_PIXEL: usize = 3;

/// 24-bit RGB color, one byte per channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Rgb {
    /// All channels off
    pub const BLACK: Self = Self::new(0x00, 0x00, 0x00);
    /// All channels at full intensity
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    /// Red only
    pub const RED: Self = Self::new(0xFF, 0x00, 0x00);
    /// Green only
    pub const GREEN: Self = Self::new(0x00, 0xFF, 0x00);
    /// Blue only
    pub const BLUE: Self = Self::new(0x00, 0x00, 0xFF);
    /// Red + green
    pub const YELLOW: Self = Self::new(0xFF, 0xFF, 0x00);
    /// Green + blue
    pub const CYAN: Self = Self::new(0x00, 0xFF, 0xFF);
    /// Red + blue
    pub const MAGENTA: Self = Self::new(0xFF, 0x00, 0xFF);

    /// Create a color from its channels
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels in framebuffer order
    pub const fn to_bytes(self) -> [u8; BYTES_PER_PIXEL] {
        [self.r, self.g, self.b]
    }

    /// Build a color from bytes in framebuffer order
    pub const fn from_bytes(bytes: [u8; BYTES_PER_PIXEL]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

/// Bars of the test pattern, left to right
pub const TEST_BARS: [Rgb; 8] = [
    Rgb::WHITE,
    Rgb::YELLOW,
    Rgb::CYAN,
    Rgb::GREEN,
    Rgb::MAGENTA,
    Rgb::RED,
    Rgb::BLUE,
    Rgb::BLACK,
];

/// Color of the test pattern at column `x` of a `width` pixel wide display
///
/// The width is split into [`TEST_BARS`]`.len()` equal bars; columns past
/// the last full bar take the last bar's color.
///
/// ```
/// use fpga_matrix_display::color::{color_bar, TEST_BARS};
///
/// assert_eq!(color_bar(0, 128), TEST_BARS[0]);
/// assert_eq!(color_bar(127, 128), TEST_BARS[7]);
/// ```
pub fn color_bar(x: usize, width: usize) -> Rgb {
    if width == 0 {
        return TEST_BARS[0];
    }
    let index = (x * TEST_BARS.len() / width).min(TEST_BARS.len() - 1);
    TEST_BARS[index]
}

#[cfg(feature = "graphics")]
impl From<embedded_graphics_core::pixelcolor::Rgb888> for Rgb {
    fn from(color: embedded_graphics_core::pixelcolor::Rgb888) -> Self {
        use embedded_graphics_core::pixelcolor::RgbColor;
        Self::new(color.r(), color.g(), color.b())
    }
}

#[cfg(feature = "graphics")]
impl From<Rgb> for embedded_graphics_core::pixelcolor::Rgb888 {
    fn from(color: Rgb) -> Self {
        Self::new(color.r, color.g, color.b)
    }
}
