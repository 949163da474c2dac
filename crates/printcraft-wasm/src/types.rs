//! WASM-compatible wrapper types for rasters.
//!
//! Pixel data lives in WASM memory; `pixels()` copies it out to a
//! `Uint8Array` that can be put straight into an `ImageData`.

use printcraft_core::decode::{Raster, CHANNELS};
use wasm_bindgen::prelude::*;

/// An RGBA raster for JavaScript.
#[wasm_bindgen]
pub struct JsRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsRaster {
    /// Wrap RGBA pixel data (4 bytes per pixel, row-major order).
    ///
    /// The buffer is not checked here; operations that read it reject a
    /// mismatched length.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> JsRaster {
        JsRaster {
            width,
            height,
            pixels,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes in the pixel buffer (width * height * 4)
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// True when the buffer length matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * CHANNELS
    }

    /// Returns RGBA pixel data as Uint8Array (a copy).
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl JsRaster {
    pub(crate) fn from_raster(raster: Raster) -> Self {
        Self {
            width: raster.width,
            height: raster.height,
            pixels: raster.pixels,
        }
    }

    /// Copy into a core raster. Clones the pixel data.
    pub(crate) fn to_raster(&self) -> Raster {
        Raster {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
        }
    }
}

/// Convert any displayable core error into a JavaScript error value.
pub(crate) fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}
