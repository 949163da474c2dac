//! Geometric cropping.
//!
//! A crop arrives as a committed drag rectangle in display coordinates plus
//! the display-to-native scale factor. It bypasses mask rasterization: the
//! rectangle is scaled, clamped to the raster bounds, and the selected rows
//! are copied into a new, smaller raster.
//!
//! # Example
//!
//! ```ignore
//! // 50x50 region at (10, 10) on a raster shown at native size
//! let cropped = crop_to_rect(&image, &CropRect::new(10.0, 10.0, 50.0, 50.0), 1.0)?;
//! assert_eq!(cropped.dimensions(), (50, 50));
//! ```

use super::{check_buffer, try_alloc_pixels, TransformError};
use crate::decode::{Raster, CHANNELS};
use crate::mask::CropRect;

/// A crop region in native pixel coordinates, already inside the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    /// Scale a display rectangle to native pixels and clamp it to
    /// `bounds`.
    ///
    /// Edges are rounded independently so adjacent crops tile without gaps.
    pub fn from_display_rect(
        rect: &CropRect,
        scale: f64,
        bounds: (u32, u32),
    ) -> Result<Self, TransformError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TransformError::InvalidScale(scale));
        }

        let r = rect.normalized();
        let (max_w, max_h) = (bounds.0 as f64, bounds.1 as f64);

        let left = (r.x * scale).round().clamp(0.0, max_w) as u32;
        let top = (r.y * scale).round().clamp(0.0, max_h) as u32;
        let right = ((r.x + r.width) * scale).round().clamp(0.0, max_w) as u32;
        let bottom = ((r.y + r.height) * scale).round().clamp(0.0, max_h) as u32;

        let region = Self {
            left,
            top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        };
        if region.width == 0 || region.height == 0 {
            return Err(TransformError::DegenerateRegion {
                left: region.left,
                top: region.top,
                width: region.width,
                height: region.height,
            });
        }
        Ok(region)
    }
}

/// Crop `image` to a display rectangle scaled by `scale`.
///
/// # Errors
///
/// - `TransformError::InvalidScale` for a non-positive or non-finite scale
/// - `TransformError::DegenerateRegion` if nothing of the rectangle lies
///   inside the raster
pub fn crop_to_rect(image: &Raster, rect: &CropRect, scale: f64) -> Result<Raster, TransformError> {
    let region = PixelRegion::from_display_rect(rect, scale, image.dimensions())?;
    crop_region(image, region)
}

/// Copy a native pixel region out of `image`.
pub fn crop_region(image: &Raster, region: PixelRegion) -> Result<Raster, TransformError> {
    check_buffer(image)?;

    let inside = region.width > 0
        && region.height > 0
        && region.left as u64 + region.width as u64 <= image.width as u64
        && region.top as u64 + region.height as u64 <= image.height as u64;
    if !inside {
        return Err(TransformError::DegenerateRegion {
            left: region.left,
            top: region.top,
            width: region.width,
            height: region.height,
        });
    }

    // Fast path: region covers the whole raster
    if region.width == image.width && region.height == image.height {
        return Ok(image.clone());
    }

    let out_w = region.width as usize;
    let out_h = region.height as usize;
    let mut output = try_alloc_pixels(out_w, out_h)?;

    let row_bytes = out_w * CHANNELS;
    let src_stride = image.width as usize * CHANNELS;
    let src_x = region.left as usize * CHANNELS;

    // Copy pixel data row by row
    for y in 0..out_h {
        let src_start = (region.top as usize + y) * src_stride + src_x;
        let dst_start = y * row_bytes;
        output[dst_start..dst_start + row_bytes]
            .copy_from_slice(&image.pixels[src_start..src_start + row_bytes]);
    }

    Ok(Raster {
        width: region.width,
        height: region.height,
        pixels: output,
    })
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn create_test_image(width: u32, height: u32) -> Raster {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        Raster::new(width, height, pixels)
    }

    proptest! {
        /// Property: successful crops stay within the source bounds and are consistent.
        #[test]
        fn prop_output_bounded_by_input(
            (width, height) in (4u32..=100, 4u32..=100),
            (x, y, w, h) in (-50.0f64..150.0, -50.0f64..150.0, -120.0f64..120.0, -120.0f64..120.0),
            scale in 0.25f64..4.0,
        ) {
            let img = create_test_image(width, height);
            if let Ok(result) = crop_to_rect(&img, &CropRect::new(x, y, w, h), scale) {
                prop_assert!(result.width >= 1 && result.width <= width);
                prop_assert!(result.height >= 1 && result.height <= height);
                prop_assert_eq!(result.pixels.len(), (result.width * result.height * 4) as usize);
            }
        }

        /// Property: cropped pixels come from the expected source offset.
        #[test]
        fn prop_cropped_pixels_from_original(
            (width, height) in (20u32..=60, 20u32..=60),
            (x, y) in (0u32..10, 0u32..10),
            (w, h) in (1u32..10, 1u32..10),
        ) {
            let img = create_test_image(width, height);
            let rect = CropRect::new(x as f64, y as f64, w as f64, h as f64);
            let result = crop_to_rect(&img, &rect, 1.0).unwrap();
            prop_assert_eq!(result.dimensions(), (w, h));
            for cy in 0..h {
                for cx in 0..w {
                    prop_assert_eq!(result.get_pixel(cx, cy), img.get_pixel(x + cx, y + cy));
                }
            }
        }

        /// Property: cropping is deterministic.
        #[test]
        fn prop_crop_is_deterministic(
            (width, height) in (4u32..=50, 4u32..=50),
            (x, y, w, h) in (0.0f64..50.0, 0.0f64..50.0, 1.0f64..50.0, 1.0f64..50.0),
        ) {
            let img = create_test_image(width, height);
            let rect = CropRect::new(x, y, w, h);
            let first = crop_to_rect(&img, &rect, 1.0);
            let second = crop_to_rect(&img, &rect, 1.0);
            prop_assert_eq!(first, second);
        }
    }
}
