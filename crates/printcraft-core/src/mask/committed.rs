//! Native-resolution binary masks ready for submission.

use crate::decode::Raster;
use crate::encode::{mask_to_data_uri, EncodeError};

/// Mask value for a selected pixel.
pub const SELECTED: u8 = 255;
/// Mask value for a kept pixel.
pub const KEPT: u8 = 0;

/// A binary selection raster at native resolution.
///
/// White (`SELECTED`) marks pixels to transform, black (`KEPT`) marks
/// pixels to keep. Consumed by exactly one edit operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMask {
    pub width: u32,
    pub height: u32,
    /// One byte per pixel, row-major, either `SELECTED` or `KEPT`.
    pub data: Vec<u8>,
}

impl CommittedMask {
    /// Dimensions as `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the pixel at `(x, y)` is selected. Out of bounds is not.
    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize] == SELECTED
    }

    /// Number of selected pixels.
    pub fn selected_count(&self) -> u64 {
        self.data.iter().filter(|&&v| v == SELECTED).count() as u64
    }

    /// True if the mask was authored against a raster of this size.
    pub fn matches(&self, raster: &Raster) -> bool {
        self.dimensions() == raster.dimensions()
    }

    /// Convert to a grayscale image for encoding.
    pub fn to_luma_image(&self) -> Option<image::GrayImage> {
        image::GrayImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Grayscale PNG wrapped in a `data:` URI, as sent to edit services.
    pub fn to_png_data_uri(&self) -> Result<String, EncodeError> {
        mask_to_data_uri(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_mask() -> CommittedMask {
        CommittedMask {
            width: 2,
            height: 2,
            data: vec![SELECTED, KEPT, KEPT, SELECTED],
        }
    }

    #[test]
    fn test_selected_count() {
        assert_eq!(checker_mask().selected_count(), 2);
    }

    #[test]
    fn test_is_selected() {
        let mask = checker_mask();
        assert!(mask.is_selected(0, 0));
        assert!(!mask.is_selected(1, 0));
        assert!(mask.is_selected(1, 1));
        assert!(!mask.is_selected(5, 5));
    }

    #[test]
    fn test_matches_raster() {
        let mask = checker_mask();
        assert!(mask.matches(&Raster::filled(2, 2, [0, 0, 0, 255])));
        assert!(!mask.matches(&Raster::filled(2, 3, [0, 0, 0, 255])));
    }

    #[test]
    fn test_to_png_data_uri() {
        let uri = checker_mask().to_png_data_uri().unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_to_luma_image() {
        let img = checker_mask().to_luma_image().unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [255]);
        assert_eq!(img.get_pixel(1, 0).0, [0]);
    }
}
