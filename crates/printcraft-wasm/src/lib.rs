//! Printcraft WASM - WebAssembly bindings for Printcraft
//!
//! This crate exposes the synchronous parts of printcraft-core to the web
//! client. Edit operations that call external services stay on the server.
//!
//! # Module Structure
//!
//! - `types` - WASM-compatible raster wrapper
//! - `decode` - Orientation detection and upload normalization
//! - `mask` - Brush and rectangle mask authoring
//! - `transform` - Crop, checkerboard preview, PNG data URIs
//! - `pipeline` - Stage state machine over `localStorage`
//! - `logger` - `log` backend writing to the browser console
//!
//! # Usage
//!
//! ```typescript
//! import init, { normalize_upload, JsMaskSurface } from '@printcraft/wasm';
//!
//! await init();
//!
//! const upload = normalize_upload(new Uint8Array(await file.arrayBuffer()));
//! const raster = upload.take_raster();
//! const surface = new JsMaskSurface(raster.width, raster.height, 800, 600);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod logger;
mod mask;
mod pipeline;
mod transform;
mod types;

pub use decode::{normalize_upload, read_orientation, JsNormalizedUpload};
pub use mask::{JsCommittedMask, JsMaskSurface};
pub use pipeline::{JsPipeline, LocalStorageArtifactStore};
pub use transform::{checkerboard_preview, crop, to_png_data_uri};
pub use types::JsRaster;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    logger::init(if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    log::debug!("printcraft-wasm {} ready", version());
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

/// Tests that need a browser (`JsValue`, `localStorage`). Run with
/// `wasm-pack test --headless --chrome`.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_normalize_upload_rejects_garbage() {
        assert!(normalize_upload(b"garbage", JsValue::UNDEFINED).is_err());
    }

    #[wasm_bindgen_test]
    fn test_pipeline_persists_across_instances() {
        let namespace = Some("printcraft-test:".to_string());
        let mut pipeline = JsPipeline::new(namespace.clone()).unwrap();
        pipeline.clear_all(Some(0)).unwrap();
        pipeline.record_upload("https://cdn.example.com/u.png").unwrap();
        assert_eq!(pipeline.advance().unwrap(), "style");

        let resumed = JsPipeline::new(namespace).unwrap();
        assert_eq!(resumed.stage(), "style");
        assert!(resumed.artifact("upload").unwrap().is_some());
    }

    #[wasm_bindgen_test]
    fn test_mask_surface_with_default_config() {
        let surface = JsMaskSurface::new(400, 300, 200, 150, JsValue::UNDEFINED).unwrap();
        assert_eq!(surface.mode(), "brush");
        assert!(!surface.can_commit());
    }
}
