//! Upload intake: size limits, decoding, and orientation normalization.

use std::io::Cursor;

use image::ImageReader;

use super::{resolve_orientation, DecodeError, Orientation, Raster};
use crate::config::PipelineConfig;
use crate::transform::{apply_orientation, TransformError};

/// Result of normalizing one upload.
#[derive(Debug, Clone)]
pub struct NormalizedUpload {
    /// The working raster, upright whenever `corrected` is true.
    pub raster: Raster,
    /// Orientation read from the upload's metadata.
    pub orientation: Orientation,
    /// False when a non-normal orientation was detected but could not be
    /// applied, leaving the raster as decoded.
    pub corrected: bool,
}

impl NormalizedUpload {
    /// True if the raster still needs the detected orientation applied.
    pub fn fell_back(&self) -> bool {
        self.orientation != Orientation::Normal && !self.corrected
    }
}

/// Decode upload bytes into an RGBA raster without applying orientation.
///
/// # Errors
///
/// - `DecodeError::ResourceLimit` if the byte stream or the decoded image
///   is larger than `config` allows (checked before pixel allocation)
/// - `DecodeError::InvalidFormat` if the format cannot be identified
/// - `DecodeError::CorruptedFile` if decoding fails
/// - `DecodeError::EmptyImage` for zero-sized images
pub fn decode_upload(bytes: &[u8], config: &PipelineConfig) -> Result<Raster, DecodeError> {
    if bytes.len() as u64 > config.max_upload_bytes {
        return Err(DecodeError::ResourceLimit(format!(
            "upload is {} bytes, limit is {}",
            bytes.len(),
            config.max_upload_bytes
        )));
    }

    let (width, height) = open_reader(bytes)?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage);
    }
    let pixels = width as u64 * height as u64;
    if pixels > config.max_decoded_pixels {
        return Err(DecodeError::ResourceLimit(format!(
            "{}x{} is {} pixels, limit is {}",
            width, height, pixels, config.max_decoded_pixels
        )));
    }

    let img = open_reader(bytes)?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    Ok(Raster::from_rgba_image(img.into_rgba8()))
}

/// Decode an upload and rotate it upright.
///
/// Orientation problems never fail the upload: unreadable metadata means
/// no correction, and a failed transform keeps the decoded raster as is.
pub fn normalize_upload(bytes: &[u8], config: &PipelineConfig) -> Result<NormalizedUpload, DecodeError> {
    let orientation = resolve_orientation(bytes);
    let decoded = decode_upload(bytes, config)?;

    if orientation == Orientation::Normal {
        return Ok(NormalizedUpload {
            raster: decoded,
            orientation,
            corrected: true,
        });
    }

    let oriented = apply_orientation(&decoded, orientation);
    Ok(settle_orientation(decoded, orientation, oriented))
}

/// Pick the oriented raster, or fall back to the decoded one when the
/// transform failed.
fn settle_orientation(
    decoded: Raster,
    orientation: Orientation,
    oriented: Result<Raster, TransformError>,
) -> NormalizedUpload {
    match oriented {
        Ok(raster) => {
            log::debug!(
                "normalized orientation {} ({}x{} -> {}x{})",
                orientation.code(),
                decoded.width,
                decoded.height,
                raster.width,
                raster.height
            );
            NormalizedUpload {
                raster,
                orientation,
                corrected: true,
            }
        }
        Err(e) => {
            log::warn!(
                "orientation {} could not be applied, using decoded image: {}",
                orientation.code(),
                e
            );
            NormalizedUpload {
                raster: decoded,
                orientation,
                corrected: false,
            }
        }
    }
}

fn open_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use crate::decode::fixtures::{encoded_jpeg, with_orientation};
    use super::*;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 128]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_jpeg() {
        let raster = decode_upload(&encoded_jpeg(), &PipelineConfig::default()).unwrap();
        assert_eq!(raster.dimensions(), (4, 2));
        assert_eq!(raster.pixels.len(), 4 * 2 * 4);
    }

    #[test]
    fn test_decode_png_keeps_alpha() {
        let raster = decode_upload(&encoded_png(3, 3), &PipelineConfig::default()).unwrap();
        assert_eq!(raster.get_pixel(1, 1), Some([10, 20, 30, 128]));
        assert!(raster.has_transparency());
    }

    #[test]
    fn test_unknown_format() {
        let result = decode_upload(b"definitely not an image", &PipelineConfig::default());
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_truncated_jpeg() {
        // Signature and JFIF header only, no frame header
        let jpeg = encoded_jpeg();
        let result = decode_upload(&jpeg[..20], &PipelineConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_byte_limit() {
        let config = PipelineConfig {
            max_upload_bytes: 16,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            decode_upload(&encoded_jpeg(), &config),
            Err(DecodeError::ResourceLimit(_))
        ));
    }

    #[test]
    fn test_decoded_pixel_limit() {
        let config = PipelineConfig {
            max_decoded_pixels: 7,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            decode_upload(&encoded_jpeg(), &config),
            Err(DecodeError::ResourceLimit(_))
        ));
    }

    #[test]
    fn test_failed_transform_keeps_decoded_raster() {
        // Buffer one pixel short, so the rotation refuses it
        let decoded = Raster {
            width: 4,
            height: 2,
            pixels: vec![200; 7 * 4],
        };
        let oriented = apply_orientation(&decoded, Orientation::Rotate90CW);
        assert!(matches!(oriented, Err(TransformError::BufferMismatch { .. })));

        let upload = settle_orientation(decoded.clone(), Orientation::Rotate90CW, oriented);
        assert!(!upload.corrected);
        assert!(upload.fell_back());
        assert_eq!(upload.orientation, Orientation::Rotate90CW);
        assert_eq!(upload.raster, decoded);
    }

    #[test]
    fn test_successful_transform_is_corrected() {
        let decoded = Raster::filled(4, 2, [0, 0, 0, 255]);
        let rotated = Raster::filled(2, 4, [0, 0, 0, 255]);
        let upload = settle_orientation(decoded, Orientation::Rotate90CW, Ok(rotated.clone()));
        assert!(upload.corrected);
        assert!(!upload.fell_back());
        assert_eq!(upload.raster, rotated);
    }

    #[test]
    fn test_normalize_rotates_and_swaps() {
        let bytes = with_orientation(&encoded_jpeg(), 6, true);
        let upload = normalize_upload(&bytes, &PipelineConfig::default()).unwrap();
        assert_eq!(upload.orientation, Orientation::Rotate90CW);
        assert!(upload.corrected);
        assert!(!upload.fell_back());
        assert_eq!(upload.raster.dimensions(), (2, 4));
    }

    #[test]
    fn test_normalize_without_metadata() {
        let upload = normalize_upload(&encoded_png(5, 2), &PipelineConfig::default()).unwrap();
        assert_eq!(upload.orientation, Orientation::Normal);
        assert_eq!(upload.raster.dimensions(), (5, 2));
    }

    #[test]
    fn test_normalize_flip_keeps_dimensions() {
        let bytes = with_orientation(&encoded_jpeg(), 2, false);
        let upload = normalize_upload(&bytes, &PipelineConfig::default()).unwrap();
        assert_eq!(upload.orientation, Orientation::FlipHorizontal);
        assert_eq!(upload.raster.dimensions(), (4, 2));
    }
}
