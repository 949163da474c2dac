//! Upload decoding WASM bindings.
//!
//! # Functions
//!
//! - [`read_orientation`] - EXIF orientation code (1-8) of an upload
//! - [`normalize_upload`] - Decode an upload and rotate it upright
//!
//! # Example
//!
//! ```typescript
//! import { normalize_upload } from '@printcraft/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const upload = normalize_upload(bytes);
//! if (upload.fell_back) console.warn('orientation could not be applied');
//! ```

use crate::types::{js_error, JsRaster};
use printcraft_core::decode;
use printcraft_core::PipelineConfig;
use wasm_bindgen::prelude::*;

/// Result of [`normalize_upload`].
#[wasm_bindgen]
pub struct JsNormalizedUpload {
    raster: Option<JsRaster>,
    orientation: u8,
    corrected: bool,
}

#[wasm_bindgen]
impl JsNormalizedUpload {
    /// Take the decoded raster. Returns `undefined` on the second call.
    pub fn take_raster(&mut self) -> Option<JsRaster> {
        self.raster.take()
    }

    /// EXIF orientation code read from the upload
    #[wasm_bindgen(getter)]
    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    #[wasm_bindgen(getter)]
    pub fn corrected(&self) -> bool {
        self.corrected
    }

    /// True when a rotation was detected but could not be applied.
    #[wasm_bindgen(getter)]
    pub fn fell_back(&self) -> bool {
        self.orientation != 1 && !self.corrected
    }
}

/// Read the EXIF orientation code of `bytes`.
///
/// Never fails: anything without a readable orientation tag is `1`.
#[wasm_bindgen]
pub fn read_orientation(bytes: &[u8]) -> u8 {
    decode::resolve_orientation(bytes).code()
}

/// Decode an upload and apply its EXIF orientation.
///
/// `config` is an optional partial `PipelineConfig` object; missing fields
/// take their defaults.
///
/// # Errors
///
/// Returns an error if the bytes are not a decodable image or exceed the
/// configured size limits.
#[wasm_bindgen]
pub fn normalize_upload(bytes: &[u8], config: JsValue) -> Result<JsNormalizedUpload, JsValue> {
    let config = config_from_js(config)?;
    upload_from_bytes(bytes, &config).map_err(js_error)
}

pub(crate) fn config_from_js(value: JsValue) -> Result<PipelineConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(PipelineConfig::default());
    }
    let config: PipelineConfig =
        serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
    config.validate().map_err(js_error)?;
    Ok(config)
}

fn upload_from_bytes(bytes: &[u8], config: &PipelineConfig) -> Result<JsNormalizedUpload, decode::DecodeError> {
    let upload = decode::normalize_upload(bytes, config)?;
    Ok(JsNormalizedUpload {
        raster: Some(JsRaster::from_raster(upload.raster)),
        orientation: upload.orientation.code(),
        corrected: upload.corrected,
    })
}
