//! Pipeline bindings over browser `localStorage`.
//!
//! Every artifact is stored under `<namespace><key>`, so reloading the page
//! resumes the session where it was left.
//!
//! ```typescript
//! const pipeline = new JsPipeline('printcraft:');
//! pipeline.record_upload(uploadUrl);
//! pipeline.advance(); // "style"
//! ```

use crate::types::js_error;
use printcraft_core::edit::ImageRef;
use printcraft_core::pipeline::{
    ArtifactStore, CartError, CartInspector, ClearOutcome, Placement, PipelineError, PipelineStage,
    PipelineStateMachine, StoreError,
};
use wasm_bindgen::prelude::*;

const DEFAULT_NAMESPACE: &str = "printcraft:";

/// `ArtifactStore` backed by `window.localStorage`.
pub struct LocalStorageArtifactStore {
    storage: web_sys::Storage,
    namespace: String,
}

impl LocalStorageArtifactStore {
    pub fn open(namespace: &str) -> Result<Self, StoreError> {
        let window = web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(storage_error)?
            .ok_or_else(|| StoreError::Unavailable("localStorage is disabled".to_string()))?;
        Ok(Self {
            storage,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

impl ArtifactStore for LocalStorageArtifactStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(&self.key(key)).map_err(storage_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // Fails when the quota is exhausted
        self.storage.set_item(&self.key(key), value).map_err(storage_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.storage.remove_item(&self.key(key)).map_err(storage_error)
    }
}

fn storage_error(e: JsValue) -> StoreError {
    StoreError::Unavailable(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

/// Cart whose item count was already resolved by the caller.
struct ResolvedCart(Option<u32>);

impl CartInspector for ResolvedCart {
    async fn item_count(&self) -> Result<usize, CartError> {
        self.0
            .map(|n| n as usize)
            .ok_or_else(|| CartError("cart state unavailable".to_string()))
    }
}

fn clear_session<A: ArtifactStore>(
    machine: &mut PipelineStateMachine<A>,
    cart_items: Option<u32>,
) -> Result<ClearOutcome, PipelineError> {
    // The cart is already resolved, so the future completes on first poll
    pollster::block_on(machine.clear_all(&ResolvedCart(cart_items)))
}

fn parse_stage(stage: &str) -> Result<PipelineStage, JsValue> {
    stage.parse::<PipelineStage>().map_err(|e| JsValue::from_str(&e))
}

fn parse_image(value: &str) -> Result<ImageRef, JsValue> {
    ImageRef::parse(value).ok_or_else(|| JsValue::from_str("Expected an image URL or data URI"))
}

/// The design pipeline for JavaScript.
#[wasm_bindgen]
pub struct JsPipeline {
    inner: PipelineStateMachine<LocalStorageArtifactStore>,
}

#[wasm_bindgen]
impl JsPipeline {
    /// Open (and resume) the session stored under `namespace`.
    #[wasm_bindgen(constructor)]
    pub fn new(namespace: Option<String>) -> Result<JsPipeline, JsValue> {
        let namespace = namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let store = LocalStorageArtifactStore::open(&namespace).map_err(js_error)?;
        let inner = PipelineStateMachine::open(store).map_err(js_error)?;
        Ok(JsPipeline { inner })
    }

    #[wasm_bindgen(getter)]
    pub fn stage(&self) -> String {
        self.inner.stage().as_str().to_string()
    }

    pub fn can_go_to(&self, stage: &str) -> Result<bool, JsValue> {
        self.inner.can_go_to(parse_stage(stage)?).map_err(js_error)
    }

    pub fn can_advance(&self) -> Result<bool, JsValue> {
        self.inner.can_advance().map_err(js_error)
    }

    pub fn go_to(&mut self, stage: &str) -> Result<(), JsValue> {
        let stage = parse_stage(stage)?;
        self.inner.go_to(stage).map_err(js_error)
    }

    /// Step forward; returns the new stage name.
    pub fn advance(&mut self) -> Result<String, JsValue> {
        self.inner.advance().map(|s| s.as_str().to_string()).map_err(js_error)
    }

    /// Step back; returns the new stage name.
    pub fn back(&mut self) -> Result<String, JsValue> {
        self.inner.back().map(|s| s.as_str().to_string()).map_err(js_error)
    }

    /// Image reference stored for `stage`, if any.
    pub fn artifact(&self, stage: &str) -> Result<Option<String>, JsValue> {
        let stage = parse_stage(stage)?;
        Ok(self
            .inner
            .artifact(stage)
            .map_err(js_error)?
            .map(|image| image.as_str().to_string()))
    }

    pub fn record_upload(&mut self, image: &str) -> Result<(), JsValue> {
        let image = parse_image(image)?;
        self.inner.record_upload(&image).map_err(js_error)
    }

    pub fn record_style(&mut self, style: &str) -> Result<(), JsValue> {
        self.inner.record_style(style).map_err(js_error)
    }

    pub fn record_conversion(&mut self, image: &str) -> Result<(), JsValue> {
        let image = parse_image(image)?;
        self.inner.record_conversion(&image).map_err(js_error)
    }

    pub fn record_edit(&mut self, image: &str) -> Result<(), JsValue> {
        let image = parse_image(image)?;
        self.inner.record_edit(&image).map_err(js_error)
    }

    pub fn discard_edit(&mut self) -> Result<(), JsValue> {
        self.inner.discard_edit().map_err(js_error)
    }

    pub fn record_color_reduction(&mut self, image: &str) -> Result<(), JsValue> {
        let image = parse_image(image)?;
        self.inner.record_color_reduction(&image).map_err(js_error)
    }

    pub fn record_preview(&mut self, image: &str) -> Result<(), JsValue> {
        let image = parse_image(image)?;
        self.inner.record_preview(&image).map_err(js_error)
    }

    pub fn set_position(&mut self, name: &str) -> Result<(), JsValue> {
        self.inner.set_position(name).map_err(js_error)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), JsValue> {
        self.inner.set_zoom(zoom).map_err(js_error)
    }

    /// Request object for the garment compositor.
    pub fn composition_request(&self, x_percent: f64, y_percent: f64, size_percent: f64) -> Result<JsValue, JsValue> {
        let request = self
            .inner
            .composition_request(Placement::new(x_percent, y_percent, size_percent))
            .map_err(js_error)?;
        serde_wasm_bindgen::to_value(&request).map_err(js_error)
    }

    /// Clear the session. Pass the cart's item count, or `undefined` when
    /// it could not be determined; cart-linked data is kept unless the
    /// cart is known to be empty. Returns whether anything was kept.
    pub fn clear_all(&mut self, cart_items: Option<u32>) -> Result<bool, JsValue> {
        clear_session(&mut self.inner, cart_items)
            .map(|outcome| outcome.preserved_cart_data)
            .map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printcraft_core::pipeline::{keys, MemoryArtifactStore};

    fn machine_with_preview() -> PipelineStateMachine<MemoryArtifactStore> {
        let mut m = PipelineStateMachine::open(MemoryArtifactStore::new()).unwrap();
        let image = ImageRef::parse("https://cdn.example.com/a.png").unwrap();
        m.record_upload(&image).unwrap();
        m.record_style("line-art").unwrap();
        m.record_conversion(&image).unwrap();
        m.record_preview(&image).unwrap();
        m.set_position("front-center").unwrap();
        m
    }

    #[test]
    fn test_clear_with_empty_cart() {
        let mut m = machine_with_preview();
        let outcome = clear_session(&mut m, Some(0)).unwrap();
        assert!(!outcome.preserved_cart_data);
        assert!(m.store().is_empty());
    }

    #[test]
    fn test_clear_with_unknown_cart_keeps_linked_keys() {
        let mut m = machine_with_preview();
        let outcome = clear_session(&mut m, None).unwrap();
        assert!(outcome.preserved_cart_data);
        assert!(m.store().contains(keys::PREVIEW_IMAGE));
        assert!(m.store().contains(keys::SELECTED_POSITION));
        assert!(!m.store().contains(keys::UPLOADED_IMAGE));
    }
}
