//! Orientation normalization.
//!
//! Each EXIF orientation maps to one fixed pixel permutation. The
//! destination buffer is freshly allocated and filled by looking up, for
//! every destination pixel, the source pixel it comes from:
//!
//! ```text
//! code  transform                 source of dst(x, y)
//!  1    identity                  (x,         y)
//!  2    flip horizontal           (w-1-x,     y)
//!  3    rotate 180                (w-1-x,     h-1-y)
//!  4    flip vertical             (x,         h-1-y)
//!  5    transpose                 (y,         x)
//!  6    rotate 90 CW              (y,         h-1-x)
//!  7    flip horizontal + 90 CW   (w-1-y,     h-1-x)
//!  8    rotate 90 CCW             (w-1-y,     x)
//! ```
//!
//! `w`/`h` are the source dimensions; codes 5-8 swap them.

use super::{check_buffer, try_alloc_pixels, TransformError};
use crate::decode::{Orientation, Raster, CHANNELS};

/// Dimensions of the upright raster for a source of `width` x `height`.
pub fn oriented_dimensions(width: u32, height: u32, orientation: Orientation) -> (u32, u32) {
    if orientation.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    }
}

/// Produce an upright copy of `image` according to `orientation`.
///
/// # Errors
///
/// - `TransformError::BufferMismatch` if the source buffer is inconsistent
/// - `TransformError::Allocation` if the destination cannot be allocated
pub fn apply_orientation(image: &Raster, orientation: Orientation) -> Result<Raster, TransformError> {
    check_buffer(image)?;

    if orientation == Orientation::Normal {
        return Ok(image.clone());
    }

    let src_w = image.width as usize;
    let src_h = image.height as usize;
    let (dst_w, dst_h) = oriented_dimensions(image.width, image.height, orientation);
    let (dst_w, dst_h) = (dst_w as usize, dst_h as usize);

    let mut output = try_alloc_pixels(dst_w, dst_h)?;

    for dy in 0..dst_h {
        let dst_row_start = dy * dst_w * CHANNELS;
        for dx in 0..dst_w {
            let (sx, sy) = source_coord(orientation, dx, dy, src_w, src_h);
            let src_idx = (sy * src_w + sx) * CHANNELS;
            let dst_idx = dst_row_start + dx * CHANNELS;
            output[dst_idx..dst_idx + CHANNELS]
                .copy_from_slice(&image.pixels[src_idx..src_idx + CHANNELS]);
        }
    }

    Ok(Raster {
        width: dst_w as u32,
        height: dst_h as u32,
        pixels: output,
    })
}

/// Map a destination pixel back to the source pixel it is copied from.
#[inline]
fn source_coord(
    orientation: Orientation,
    dx: usize,
    dy: usize,
    src_w: usize,
    src_h: usize,
) -> (usize, usize) {
    match orientation {
        Orientation::Normal => (dx, dy),
        Orientation::FlipHorizontal => (src_w - 1 - dx, dy),
        Orientation::Rotate180 => (src_w - 1 - dx, src_h - 1 - dy),
        Orientation::FlipVertical => (dx, src_h - 1 - dy),
        Orientation::Transpose => (dy, dx),
        Orientation::Rotate90CW => (dy, src_h - 1 - dx),
        Orientation::Transverse => (src_w - 1 - dy, src_h - 1 - dx),
        Orientation::Rotate90CCW => (src_w - 1 - dy, dx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops;

    /// Create a test raster where each pixel encodes its own position.
    fn test_raster(width: u32, height: u32) -> Raster {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, ((y * width + x) % 256) as u8, 255]);
            }
        }
        Raster::new(width, height, pixels)
    }

    /// Reference result computed with the `image` crate's own operations.
    fn reference(raster: &Raster, orientation: Orientation) -> Raster {
        let img = raster.to_rgba_image().unwrap();
        let out = match orientation {
            Orientation::Normal => img,
            Orientation::FlipHorizontal => imageops::flip_horizontal(&img),
            Orientation::Rotate180 => imageops::rotate180(&img),
            Orientation::FlipVertical => imageops::flip_vertical(&img),
            Orientation::Transpose => imageops::flip_horizontal(&imageops::rotate90(&img)),
            Orientation::Rotate90CW => imageops::rotate90(&img),
            Orientation::Transverse => imageops::flip_horizontal(&imageops::rotate270(&img)),
            Orientation::Rotate90CCW => imageops::rotate270(&img),
        };
        Raster::from_rgba_image(out)
    }

    #[test]
    fn test_normal_is_identity() {
        let img = test_raster(5, 3);
        assert_eq!(apply_orientation(&img, Orientation::Normal).unwrap(), img);
    }

    #[test]
    fn test_matches_image_crate_for_every_code() {
        let img = test_raster(5, 3);
        for orientation in Orientation::ALL {
            let ours = apply_orientation(&img, orientation).unwrap();
            assert_eq!(ours, reference(&img, orientation), "code {}", orientation.code());
        }
    }

    #[test]
    fn test_rotate90_cw_moves_bottom_left_to_top_left() {
        let img = test_raster(4, 2);
        let out = apply_orientation(&img, Orientation::Rotate90CW).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        // Source (0, 1) is the bottom-left corner
        assert_eq!(out.get_pixel(0, 0), Some([0, 1, 4, 255]));
    }

    #[test]
    fn test_quarter_turns_swap_dimensions() {
        let img = test_raster(6, 2);
        for orientation in Orientation::ALL {
            let out = apply_orientation(&img, orientation).unwrap();
            let expected = if orientation.swaps_dimensions() { (2, 6) } else { (6, 2) };
            assert_eq!(out.dimensions(), expected);
            assert_eq!(out.pixels.len(), img.pixels.len());
        }
    }

    #[test]
    fn test_flip_horizontal_swaps_columns() {
        let img = test_raster(2, 1);
        let out = apply_orientation(&img, Orientation::FlipHorizontal).unwrap();
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(1, 0));
        assert_eq!(out.get_pixel(1, 0), img.get_pixel(0, 0));
    }

    #[test]
    fn test_single_pixel() {
        let img = test_raster(1, 1);
        for orientation in Orientation::ALL {
            assert_eq!(apply_orientation(&img, orientation).unwrap(), img);
        }
    }

    #[test]
    fn test_inconsistent_buffer_is_rejected() {
        let img = Raster {
            width: 3,
            height: 3,
            pixels: vec![0; 10],
        };
        assert!(matches!(
            apply_orientation(&img, Orientation::Rotate90CW),
            Err(TransformError::BufferMismatch { .. })
        ));
    }

    #[test]
    fn test_oriented_dimensions() {
        assert_eq!(oriented_dimensions(6000, 4000, Orientation::Normal), (6000, 4000));
        assert_eq!(oriented_dimensions(6000, 4000, Orientation::Rotate90CW), (4000, 6000));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
