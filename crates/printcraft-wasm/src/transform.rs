//! WASM bindings for local raster operations: crop, checkerboard preview
//! and PNG embedding.

use crate::types::{js_error, JsRaster};
use printcraft_core::decode::Raster;
use printcraft_core::encode::{composite_over_checkerboard, raster_to_data_uri, EncodeError};
use printcraft_core::mask::CropRect;
use printcraft_core::transform::{crop_to_rect, TransformError};
use printcraft_core::PipelineConfig;
use wasm_bindgen::prelude::*;

/// Crop a display-space rectangle, scaled by `scale` into native pixels.
///
/// The rectangle may have negative width or height (a drag up or left);
/// parts outside the raster are clipped.
///
/// # Example (TypeScript)
///
/// ```typescript
/// const scale = image.width / canvas.width;
/// const cropped = crop(image, 10, 10, 50, 50, scale);
/// ```
#[wasm_bindgen]
pub fn crop(image: &JsRaster, x: f64, y: f64, width: f64, height: f64, scale: f64) -> Result<JsRaster, JsValue> {
    crop_raster(&image.to_raster(), CropRect::new(x, y, width, height), scale).map_err(js_error)
}

/// Composite a raster over a light/dark checkerboard for display.
///
/// Returns an opaque copy; the input is untouched. `cell` is the square
/// size in pixels (0 is treated as 1); when omitted the configured default
/// cell size is used.
#[wasm_bindgen]
pub fn checkerboard_preview(image: &JsRaster, cell: Option<u32>) -> Result<JsRaster, JsValue> {
    if !image.is_valid() {
        return Err(JsValue::from_str("Pixel buffer does not match raster dimensions"));
    }
    Ok(preview_raster(&image.to_raster(), cell))
}

/// Encode a raster as a PNG `data:` URI.
#[wasm_bindgen]
pub fn to_png_data_uri(image: &JsRaster) -> Result<String, JsValue> {
    encode_raster(&image.to_raster()).map_err(js_error)
}

fn crop_raster(raster: &Raster, rect: CropRect, scale: f64) -> Result<JsRaster, TransformError> {
    crop_to_rect(raster, &rect, scale).map(JsRaster::from_raster)
}

fn preview_raster(raster: &Raster, cell: Option<u32>) -> JsRaster {
    let cell = cell.unwrap_or(PipelineConfig::default().checkerboard_cell);
    JsRaster::from_raster(composite_over_checkerboard(raster, cell.max(1)))
}

fn encode_raster(raster: &Raster) -> Result<String, EncodeError> {
    raster_to_data_uri(raster)
}
