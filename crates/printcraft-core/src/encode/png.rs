//! PNG encoding for service submission.
//!
//! Rasters are sent as RGBA PNG so transparency from background isolation
//! survives the round trip; masks are sent as single-channel grayscale PNG.

use image::codecs::png::PngEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

use crate::decode::{Raster, CHANNELS};
use crate::mask::CommittedMask;

/// Errors that can occur while encoding or embedding images.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),

    /// A data URI could not be parsed
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
}

/// Encode an RGBA raster as PNG bytes.
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, EncodeError> {
    encode(&raster.pixels, raster.width, raster.height, CHANNELS, ExtendedColorType::Rgba8)
}

/// Encode a committed mask as grayscale PNG bytes.
pub fn encode_mask_png(mask: &CommittedMask) -> Result<Vec<u8>, EncodeError> {
    encode(&mask.data, mask.width, mask.height, 1, ExtendedColorType::L8)
}

fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    color: ExtendedColorType,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected_len = width as usize * height as usize * channels;
    if pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: pixels.len(),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(pixels, width, height, color)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{KEPT, SELECTED};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_png_round_trips_alpha() {
        let raster = Raster::filled(3, 2, [1, 2, 3, 77]);
        let bytes = encode_png(&raster).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(Raster::from_rgba_image(decoded), raster);
    }

    #[test]
    fn test_encode_mask_is_grayscale() {
        let mask = CommittedMask {
            width: 2,
            height: 1,
            data: vec![SELECTED, KEPT],
        };
        let bytes = encode_mask_png(&mask).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!(decoded.into_luma8().into_raw(), vec![255, 0]);
    }

    #[test]
    fn test_zero_dimensions() {
        let raster = Raster {
            width: 0,
            height: 4,
            pixels: vec![],
        };
        assert!(matches!(encode_png(&raster), Err(EncodeError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_short_buffer() {
        let raster = Raster {
            width: 2,
            height: 2,
            pixels: vec![0; 15],
        };
        assert!(matches!(
            encode_png(&raster),
            Err(EncodeError::InvalidPixelData { expected: 16, actual: 15 })
        ));
    }
}
