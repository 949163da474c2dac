//! Mask authoring WASM bindings.
//!
//! The canvas forwards pointer events in display coordinates; the surface
//! keeps the display-to-native transform and produces native-resolution
//! masks on commit.
//!
//! ```typescript
//! const surface = new JsMaskSurface(4000, 3000, canvas.width, canvas.height, undefined);
//! canvas.onpointerdown = (e) => surface.pointer_down(e.offsetX, e.offsetY);
//! canvas.onpointermove = (e) => surface.pointer_move(e.offsetX, e.offsetY);
//! canvas.onpointerup = () => surface.pointer_up();
//! const mask = surface.commit();
//! ```

use crate::decode::config_from_js;
use crate::types::js_error;
use printcraft_core::mask::{
    CommittedMask, DisplayTransform, MaskSurface, Point, SelectionMode, SurfaceSettings,
};
use wasm_bindgen::prelude::*;

/// Parse a mode name as used by the UI.
fn parse_mode(mode: &str) -> Option<SelectionMode> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "brush" => Some(SelectionMode::Brush),
        "rectangle" | "rect" => Some(SelectionMode::Rectangle),
        _ => None,
    }
}

fn mode_name(mode: SelectionMode) -> &'static str {
    match mode {
        SelectionMode::Brush => "brush",
        SelectionMode::Rectangle => "rectangle",
    }
}

/// A mask surface bound to one displayed raster.
#[wasm_bindgen]
pub struct JsMaskSurface {
    inner: MaskSurface,
    native_width: u32,
    native_height: u32,
}

#[wasm_bindgen]
impl JsMaskSurface {
    /// Create a surface for a `native_width` x `native_height` raster shown
    /// at `display_width` x `display_height`.
    ///
    /// `config` is an optional partial `PipelineConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(
        native_width: u32,
        native_height: u32,
        display_width: u32,
        display_height: u32,
        config: JsValue,
    ) -> Result<JsMaskSurface, JsValue> {
        let settings = config_from_js(config)?.surface_settings();
        Self::with_settings(native_width, native_height, display_width, display_height, settings)
            .ok_or_else(|| JsValue::from_str("Raster and display sizes must be non-zero"))
    }

    /// Re-bind after the canvas was resized. Clears the selection.
    pub fn resize_display(&mut self, display_width: u32, display_height: u32) -> bool {
        match DisplayTransform::fit((self.native_width, self.native_height), (display_width, display_height)) {
            Some(transform) => {
                self.inner.rebind(display_width, display_height, transform);
                true
            }
            None => false,
        }
    }

    /// Current mode, `"brush"` or `"rectangle"`.
    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        mode_name(self.inner.mode()).to_string()
    }

    /// Switch mode. Returns false for an unknown mode name.
    pub fn set_mode(&mut self, mode: &str) -> bool {
        match parse_mode(mode) {
            Some(mode) => {
                self.inner.set_mode(mode);
                true
            }
            None => false,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn brush_radius(&self) -> f64 {
        self.inner.brush_radius()
    }

    pub fn set_brush_radius(&mut self, radius: f64) {
        self.inner.set_brush_radius(radius);
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.inner.pointer_down(Point::new(x, y));
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.inner.pointer_move(Point::new(x, y));
    }

    pub fn pointer_up(&mut self) {
        self.inner.pointer_up();
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    #[wasm_bindgen(getter)]
    pub fn has_selection(&self) -> bool {
        self.inner.has_selection()
    }

    /// Whether commit would currently succeed (used to enable buttons).
    #[wasm_bindgen(getter)]
    pub fn can_commit(&self) -> bool {
        self.inner.can_commit()
    }

    /// Selected display pixels, for the on-canvas overlay.
    pub fn selected_display_pixels(&self) -> f64 {
        self.inner.selected_display_pixels() as f64
    }

    /// Commit the selection as a native-resolution mask.
    pub fn commit(&self) -> Result<JsCommittedMask, JsValue> {
        self.commit_mask().map_err(js_error)
    }

    /// Commit the rectangle as `[x, y, width, height]` in native pixels.
    pub fn commit_rect(&self) -> Result<Vec<f64>, JsValue> {
        self.native_rect().map_err(js_error)
    }
}

impl JsMaskSurface {
    pub(crate) fn with_settings(
        native_width: u32,
        native_height: u32,
        display_width: u32,
        display_height: u32,
        settings: SurfaceSettings,
    ) -> Option<Self> {
        let inner = MaskSurface::fit(
            (native_width, native_height),
            (display_width, display_height),
            settings,
        )?;
        Some(Self {
            inner,
            native_width,
            native_height,
        })
    }

    fn commit_mask(&self) -> Result<JsCommittedMask, printcraft_core::mask::MaskError> {
        let mask = self.inner.commit(self.native_width, self.native_height)?;
        Ok(JsCommittedMask { inner: mask })
    }

    fn native_rect(&self) -> Result<Vec<f64>, printcraft_core::mask::MaskError> {
        let rect = self
            .inner
            .commit_rect()?
            .normalized()
            .to_native(&self.inner.transform());
        Ok(vec![rect.x, rect.y, rect.width, rect.height])
    }
}

/// A committed native-resolution mask.
#[wasm_bindgen]
pub struct JsCommittedMask {
    inner: CommittedMask,
}

#[wasm_bindgen]
impl JsCommittedMask {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn selected_count(&self) -> f64 {
        self.inner.selected_count() as f64
    }

    /// One byte per pixel: 255 selected, 0 kept.
    pub fn data(&self) -> Vec<u8> {
        self.inner.data.clone()
    }

    /// Grayscale PNG `data:` URI for submission to an edit service.
    pub fn to_data_uri(&self) -> Result<String, JsValue> {
        self.inner.to_png_data_uri().map_err(js_error)
    }
}
