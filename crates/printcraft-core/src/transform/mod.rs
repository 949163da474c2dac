//! Geometric raster transforms: orientation normalization and cropping.
//!
//! Both operations only permute or select existing pixels; no sample is
//! ever interpolated, so results are exact.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner
//! - Raster coordinates are native pixels
//! - Crop rectangles arrive in display coordinates plus a display-to-native
//!   scale factor

mod crop;
mod orient;

pub use crop::{crop_region, crop_to_rect, PixelRegion};
pub use orient::{apply_orientation, oriented_dimensions};

use thiserror::Error;

/// Failures while producing a transformed raster.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// The destination buffer could not be allocated.
    #[error("Cannot allocate {width}x{height} destination raster")]
    Allocation { width: usize, height: usize },

    /// Source pixel buffer does not match its declared dimensions.
    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    /// Display-to-native scale must be finite and positive.
    #[error("Invalid scale factor: {0}")]
    InvalidScale(f64),

    /// The requested region has no area inside the raster.
    #[error("Region {width}x{height} at ({left}, {top}) has no area inside the raster")]
    DegenerateRegion {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
}

/// Allocate a zeroed pixel buffer, reporting failure instead of aborting.
pub(crate) fn try_alloc_pixels(width: usize, height: usize) -> Result<Vec<u8>, TransformError> {
    let len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(crate::decode::CHANNELS))
        .ok_or(TransformError::Allocation { width, height })?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| TransformError::Allocation { width, height })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Verify a raster's buffer matches its dimensions before indexing into it.
pub(crate) fn check_buffer(image: &crate::decode::Raster) -> Result<(), TransformError> {
    let expected = image.width as usize * image.height as usize * crate::decode::CHANNELS;
    if image.pixels.len() != expected {
        return Err(TransformError::BufferMismatch {
            expected,
            actual: image.pixels.len(),
        });
    }
    Ok(())
}
