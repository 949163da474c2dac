//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Error types for upload decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The upload exceeds a configured size limit.
    #[error("Image exceeds limit: {0}")]
    ResourceLimit(String),

    /// The image has no pixels.
    #[error("Image has zero width or height")]
    EmptyImage,
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (reflect over the main diagonal).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (horizontal flip, then rotate 90 CW).
    Transverse = 7,
    /// Rotate 90 degrees counter-clockwise.
    Rotate90CCW = 8,
}

impl Orientation {
    /// All eight orientations in EXIF code order.
    pub const ALL: [Orientation; 8] = [
        Orientation::Normal,
        Orientation::FlipHorizontal,
        Orientation::Rotate180,
        Orientation::FlipVertical,
        Orientation::Transpose,
        Orientation::Rotate90CW,
        Orientation::Transverse,
        Orientation::Rotate90CCW,
    ];

    /// Returns true if this orientation swaps width and height dimensions.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate90CCW
        )
    }

    /// The orientation that undoes this one.
    ///
    /// Only the two quarter turns are not their own inverse.
    pub fn inverse(self) -> Self {
        match self {
            Orientation::Rotate90CW => Orientation::Rotate90CCW,
            Orientation::Rotate90CCW => Orientation::Rotate90CW,
            other => other,
        }
    }

    /// The EXIF code (1-8).
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate90CCW,
            _ => Orientation::Normal,
        }
    }
}

/// A decoded RGBA raster.
///
/// Rasters are never mutated once they enter the edit pipeline; every
/// destructive edit produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Width in native pixels.
    pub width: u32,
    /// Height in native pixels.
    pub height: u32,
    /// RGBA pixel data in row-major order (4 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Create a new raster with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * CHANNELS,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a raster filled with a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    /// Create a raster from an `image::RgbaImage`.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Convert to an `image::RgbaImage` for encoding.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Dimensions as `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA value at `(x, y)`, or `None` outside the raster.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = self.pixels.get(idx..idx + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if this is an empty/invalid raster.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// True when any pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks_exact(CHANNELS).any(|px| px[3] < 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(8), Orientation::Rotate90CCW);
        assert_eq!(Orientation::from(0), Orientation::Normal);
        assert_eq!(Orientation::from(99), Orientation::Normal);
    }

    #[test]
    fn test_orientation_codes_round_trip() {
        for orientation in Orientation::ALL {
            assert_eq!(Orientation::from(orientation.code() as u32), orientation);
        }
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        for code in 1..=4u32 {
            assert!(!Orientation::from(code).swaps_dimensions());
        }
        for code in 5..=8u32 {
            assert!(Orientation::from(code).swaps_dimensions());
        }
    }

    #[test]
    fn test_orientation_inverse_is_involution() {
        for orientation in Orientation::ALL {
            assert_eq!(orientation.inverse().inverse(), orientation);
        }
        assert_eq!(Orientation::Rotate90CW.inverse(), Orientation::Rotate90CCW);
        assert_eq!(Orientation::Transverse.inverse(), Orientation::Transverse);
    }

    #[test]
    fn test_raster_filled() {
        let raster = Raster::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(raster.pixels.len(), 3 * 2 * 4);
        assert_eq!(raster.get_pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(raster.get_pixel(3, 0), None);
        assert_eq!(raster.pixel_count(), 6);
        assert!(!raster.is_empty());
        assert!(!raster.has_transparency());
    }

    #[test]
    fn test_raster_empty() {
        let raster = Raster::new(0, 0, vec![]);
        assert!(raster.is_empty());
    }

    #[test]
    fn test_raster_image_conversion() {
        let raster = Raster::filled(4, 4, [10, 20, 30, 0]);
        assert!(raster.has_transparency());
        let img = raster.to_rgba_image().unwrap();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(Raster::from_rgba_image(img), raster);
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::ResourceLimit("too big".to_string());
        assert_eq!(err.to_string(), "Image exceeds limit: too big");

        let err = DecodeError::InvalidFormat;
        assert_eq!(err.to_string(), "Invalid or unsupported image format");
    }
}
