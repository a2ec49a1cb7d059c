//! Graphics support via embedded-graphics
//!
//! [`FrameBuffer`] implements
//! [`DrawTarget`](embedded_graphics_core::draw_target::DrawTarget) with
//! [`Rgb888`] colors, so any embedded-graphics primitive, font or image can
//! be drawn straight into it. Mirroring and dirty tracking apply exactly as
//! for [`FrameBuffer::write_pixel`].
//!
//! ## Example
//!
//! ```
//! use embedded_graphics::{
//!     pixelcolor::Rgb888,
//!     prelude::*,
//!     primitives::{Circle, PrimitiveStyle, Rectangle},
//! };
//! use fpga_matrix_display::{Builder, FrameBuffer, Geometry};
//!
//! # let Ok(geometry) = Geometry::new(64, 32, 2) else { return };
//! # let Ok(config) = Builder::new().geometry(geometry).build() else { return };
//! let Ok(mut frame) = FrameBuffer::new(&config) else { return };
//!
//! let _ = frame.clear(Rgb888::BLACK);
//! let _ = Rectangle::new(Point::new(2, 2), Size::new(20, 10))
//!     .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
//!     .draw(&mut frame);
//! let _ = Circle::new(Point::new(90, 4), 24)
//!     .into_styled(PrimitiveStyle::with_stroke(Rgb888::CYAN, 2))
//!     .draw(&mut frame);
//! ```

use core::convert::Infallible;
use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    pixelcolor::Rgb888,
    prelude::Pixel,
    primitives::Rectangle,
};

use crate::framebuffer::FrameBuffer;

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<Iter>(&mut self, pixels: Iter) -> Result<(), Self::Error>
    where
        Iter: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            self.write_pixel(x, y, color.into());
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let Point { x, y } = area.top_left;
        let Size { width, height } = area.size;
        self.fill_rect(x, y, width, height, color.into());
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.into());
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    #[allow(clippy::cast_possible_truncation)]
    fn size(&self) -> Size {
        Size::new(self.width() as u32, self.height() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::config::{Builder, Geometry, Mirror};
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    fn frame(mirror: Mirror) -> FrameBuffer {
        let config = Builder::new()
            .geometry(Geometry::new(64, 32, 2).unwrap())
            .mirror(mirror)
            .build()
            .unwrap();
        FrameBuffer::new(&config).unwrap()
    }

    #[test]
    fn test_size_is_chained_resolution() {
        let frame = frame(Mirror::None);
        assert_eq!(frame.size(), Size::new(128, 32));
    }

    #[test]
    fn test_filled_rectangle_marks_overlapped_chunks() {
        let mut frame = frame(Mirror::None);
        Rectangle::new(Point::new(40, 4), Size::new(30, 6))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::BLUE))
            .draw(&mut frame)
            .unwrap();

        assert_eq!(frame.pixel(40, 4), Some(Rgb::BLUE));
        assert_eq!(frame.pixel(69, 9), Some(Rgb::BLUE));
        assert_eq!(frame.pixel(70, 9), Some(Rgb::BLACK));
        let dirty = frame.dirty();
        assert!(!dirty.is_dirty(0));
        assert!(dirty.is_dirty(1));
        assert!(dirty.is_dirty(2));
        assert!(!dirty.is_dirty(3));
    }

    #[test]
    fn test_off_screen_pixels_are_dropped() {
        let mut frame = frame(Mirror::None);
        Line::new(Point::new(-10, -10), Point::new(-1, -1))
            .into_styled(PrimitiveStyle::with_stroke(Rgb888::WHITE, 1))
            .draw(&mut frame)
            .unwrap();
        assert!(!frame.dirty().any_dirty());
    }

    #[test]
    fn test_draw_respects_mirror() {
        let mut frame = frame(Mirror::Horizontal);
        Pixel(Point::new(0, 0), Rgb888::GREEN)
            .draw(&mut frame)
            .unwrap();

        assert_eq!(frame.pixel(0, 0), Some(Rgb::GREEN));
        assert_eq!(&frame.as_bytes()[127 * 3..128 * 3], &[0, 255, 0]);
        assert!(frame.dirty().is_dirty(3));
        assert!(!frame.dirty().is_dirty(0));
    }

    #[test]
    fn test_clear_fills_and_marks_everything() {
        let mut frame = frame(Mirror::None);
        frame.clear(Rgb888::YELLOW).unwrap();
        assert_eq!(frame.pixel(127, 31), Some(Rgb::YELLOW));
        assert_eq!(frame.dirty().dirty_count(), 4);
    }
}
