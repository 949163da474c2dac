//! Transparency preview.
//!
//! Background isolation returns rasters with an alpha channel. For display
//! they are composited over a light checkerboard; the stored raster is
//! never touched.

use crate::decode::{Raster, CHANNELS};

const LIGHT: u8 = 255;
const DARK: u8 = 200;

/// Composite `raster` over a checkerboard with `cell`-pixel squares.
///
/// Returns a new, fully opaque raster of the same size. A `cell` of 0 is
/// treated as 1.
pub fn composite_over_checkerboard(raster: &Raster, cell: u32) -> Raster {
    let cell = cell.max(1);
    let width = raster.width as usize;
    let mut pixels = Vec::with_capacity(raster.pixels.len());

    for (i, px) in raster.pixels.chunks_exact(CHANNELS).enumerate() {
        let x = (i % width.max(1)) as u32;
        let y = (i / width.max(1)) as u32;
        let bg = if ((x / cell) + (y / cell)) % 2 == 0 {
            LIGHT
        } else {
            DARK
        };

        let alpha = px[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8;
        pixels.extend_from_slice(&[blend(px[0]), blend(px[1]), blend(px[2]), 255]);
    }

    Raster {
        width: raster.width,
        height: raster.height,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_raster_unchanged() {
        let raster = Raster::filled(4, 4, [10, 20, 30, 255]);
        assert_eq!(composite_over_checkerboard(&raster, 2), raster);
    }

    #[test]
    fn test_transparent_shows_pattern() {
        let raster = Raster::filled(4, 4, [0, 0, 0, 0]);
        let out = composite_over_checkerboard(&raster, 2);
        assert_eq!(out.get_pixel(0, 0), Some([LIGHT, LIGHT, LIGHT, 255]));
        assert_eq!(out.get_pixel(2, 0), Some([DARK, DARK, DARK, 255]));
        assert_eq!(out.get_pixel(2, 2), Some([LIGHT, LIGHT, LIGHT, 255]));
        assert!(!out.has_transparency());
    }

    #[test]
    fn test_source_untouched() {
        let raster = Raster::filled(2, 2, [100, 100, 100, 128]);
        let copy = raster.clone();
        let out = composite_over_checkerboard(&raster, 16);
        assert_eq!(raster, copy);
        // 100 * 128/255 + 255 * 127/255, rounded
        assert_eq!(out.get_pixel(0, 0), Some([177, 177, 177, 255]));
    }

    #[test]
    fn test_zero_cell_does_not_panic() {
        let raster = Raster::filled(3, 3, [0, 0, 0, 0]);
        let out = composite_over_checkerboard(&raster, 0);
        assert_eq!(out.get_pixel(0, 0), Some([LIGHT, LIGHT, LIGHT, 255]));
        assert_eq!(out.get_pixel(1, 0), Some([DARK, DARK, DARK, 255]));
    }
}
