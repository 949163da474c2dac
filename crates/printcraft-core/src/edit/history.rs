//! Depth-1 edit history.

use std::sync::Arc;

use super::service::ImageRef;
use crate::decode::Raster;
use crate::encode::{raster_to_data_uri, EncodeError};

/// A shared, immutable working raster plus where it came from.
///
/// Cloning is cheap; two clones of the same `RasterRef` point at the same
/// pixel buffer, which is what undo restores.
#[derive(Debug, Clone)]
pub struct RasterRef {
    pub raster: Arc<Raster>,
    /// Reference returned by the service that produced the raster, if any.
    pub source: Option<ImageRef>,
}

impl RasterRef {
    pub fn new(raster: Raster, source: Option<ImageRef>) -> Self {
        Self {
            raster: Arc::new(raster),
            source,
        }
    }

    /// True if both refer to the very same raster buffer.
    pub fn ptr_eq(&self, other: &RasterRef) -> bool {
        Arc::ptr_eq(&self.raster, &other.raster)
    }

    /// A reference suitable for persisting: the service reference when
    /// there is one, otherwise the raster embedded as a PNG data URI.
    pub fn to_image_ref(&self) -> Result<ImageRef, EncodeError> {
        match &self.source {
            Some(source) => Ok(source.clone()),
            None => Ok(ImageRef::DataUri(raster_to_data_uri(&self.raster)?)),
        }
    }
}

/// Current raster plus at most one previous raster.
#[derive(Debug, Clone)]
pub struct EditHistory {
    current: RasterRef,
    previous: Option<RasterRef>,
}

impl EditHistory {
    pub fn new(current: RasterRef) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    pub fn current(&self) -> &RasterRef {
        &self.current
    }

    pub fn previous(&self) -> Option<&RasterRef> {
        self.previous.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.previous.is_some()
    }

    /// Install the result of a destructive edit. The old current raster
    /// replaces whatever was in the undo slot.
    pub fn install(&mut self, next: RasterRef) {
        let prior = std::mem::replace(&mut self.current, next);
        self.previous = Some(prior);
    }

    /// Restore the previous raster and empty the undo slot.
    ///
    /// Returns `false` (and changes nothing) when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.previous.take() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Start over from a new base raster, dropping the undo slot.
    pub fn reset(&mut self, base: RasterRef) {
        self.current = base;
        self.previous = None;
    }
}
