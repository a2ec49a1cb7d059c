//! Coordinate mirroring utilities
//!
//! This module maps logical pixel coordinates to physical framebuffer
//! coordinates for panel chains that are wired mirrored.
//!
//! ## Example
//!
//! ```
//! use fpga_matrix_display::{mirror::apply_mirror, Mirror};
//!
//! // 128x32 chain wired right-to-left: logical column 0 is physical column 127
//! assert_eq!(apply_mirror(0, 5, 128, 32, Mirror::Horizontal), (127, 5));
//! assert_eq!(apply_mirror(0, 5, 128, 32, Mirror::None), (0, 5));
//! ```

use crate::config::Mirror;

/// Map a logical coordinate to its physical position
///
/// Coordinates must already be inside `[0, width) x [0, height)`.
pub fn apply_mirror(x: usize, y: usize, width: usize, height: usize, mirror: Mirror) -> (usize, usize) {
    let x = if mirror.flips_x() { width - 1 - x } else { x };
    let y = if mirror.flips_y() { height - 1 - y } else { y };
    (x, y)
}

/// Map a half-open span `[start, end)` along an axis of length `extent`
///
/// Mirroring a span keeps it contiguous: `[start, end)` becomes
/// `[extent - end, extent - start)`.
pub fn mirror_span(start: usize, end: usize, extent: usize, flip: bool) -> (usize, usize) {
    if flip {
        (extent - end, extent - start)
    } else {
        (start, end)
    }
}
