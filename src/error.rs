//! Error types for the driver
//!
//! This module defines error types for configuration building ([`BuilderError`])
//! and display operations ([`Error`]).
//!
//! ## Error Types
//!
//! - [`BuilderError`] - Errors during configuration construction
//! - [`Error`] - Runtime errors during setup, flush and recovery
//! - [`AllocError`] - A buffer could not be allocated at setup
//!
//! Out-of-range pixel writes are not errors; they are dropped silently.
//!
//! ## Example
//!
//! ```
//! use fpga_matrix_display::{Builder, BuilderError, Geometry};
//!
//! // Missing geometry
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(BuilderError::MissingGeometry)));
//!
//! // Zero-sized panel
//! assert!(Geometry::new(0, 32, 1).is_err());
//! ```

use crate::link::DeviceLink;

/// Errors that can occur while driving the display
///
/// Generic over the link type to preserve the specific transport error.
#[derive(Debug)]
pub enum Error<L: DeviceLink> {
    /// Transfer-protocol error reported by the [`DeviceLink`]
    Link(L::Error),
    /// A chunk payload does not fit in the scratch transfer buffer
    ///
    /// The flush pass is aborted; the chunk and every chunk after it stay
    /// dirty and are retried on the next update cycle.
    ChunkTooLarge {
        /// Index of the chunk that did not fit
        chunk: usize,
        /// Payload size in bytes
        required: usize,
        /// Scratch buffer capacity in bytes
        capacity: usize,
    },
    /// A buffer could not be allocated during setup
    Allocation {
        /// Requested size in bytes
        requested: usize,
    },
    /// The operation needs buffers that were never allocated
    NotReady,
}

impl<L: DeviceLink> core::fmt::Display for Error<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Link(e) => write!(f, "Link error: {e:?}"),
            Self::ChunkTooLarge {
                chunk,
                required,
                capacity,
            } => write!(
                f,
                "Chunk {chunk} too large: required {required} bytes, scratch holds {capacity}"
            ),
            Self::Allocation { requested } => {
                write!(f, "Failed to allocate {requested} bytes")
            }
            Self::NotReady => write!(f, "Display buffers are not allocated"),
        }
    }
}

impl<L: DeviceLink + core::fmt::Debug> core::error::Error for Error<L> {}

/// A buffer allocation failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Requested size in bytes
    pub requested: usize,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to allocate {} bytes", self.requested)
    }
}

impl core::error::Error for AllocError {}

impl<L: DeviceLink> From<AllocError> for Error<L> {
    fn from(err: AllocError) -> Self {
        Self::Allocation {
            requested: err.requested,
        }
    }
}

/// Errors that can occur when building configuration
///
/// These errors occur during the builder pattern before the driver is created.
#[derive(Debug)]
pub enum BuilderError {
    /// Geometry was not specified
    ///
    /// [`Builder::geometry()`](crate::config::Builder::geometry) must be called before building.
    MissingGeometry,
    /// Invalid panel geometry
    ///
    /// See [`Geometry::new()`](crate::config::Geometry::new) for constraints.
    InvalidGeometry {
        /// Width of one panel
        panel_width: u16,
        /// Height of one panel
        panel_height: u16,
        /// Number of chained panels
        chain_length: u16,
    },
    /// Chunk width must be at least one column
    InvalidChunkWidth(u16),
    /// A timing interval was zero
    InvalidInterval(&'static str),
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingGeometry => write!(f, "Geometry must be specified"),
            Self::InvalidGeometry {
                panel_width,
                panel_height,
                chain_length,
            } => write!(
                f,
                "Invalid geometry {panel_width}x{panel_height} x{chain_length} (all non-zero, chained width must fit in 16 bits)"
            ),
            Self::InvalidChunkWidth(width) => write!(f, "Invalid chunk width {width}"),
            Self::InvalidInterval(name) => write!(f, "{name} must be non-zero"),
        }
    }
}

impl core::error::Error for BuilderError {}
