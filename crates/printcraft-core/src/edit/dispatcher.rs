//! Destructive edit dispatch.
//!
//! [`EditDispatcher`] owns the working raster and its undo slot. Each
//! operation validates its input, calls at most one external capability,
//! and only on success swaps in the result. Failures (including a
//! dropped future) leave the current raster and the undo slot exactly as
//! they were.
//!
//! Only one operation may be in flight. A second call while one is
//! pending fails immediately with [`EditError::Busy`]; interfaces poll
//! [`EditDispatcher::is_busy`] to disable their triggers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use super::history::{EditHistory, RasterRef};
use super::service::{ImageRef, OperationKind, PixelTransformService, ServiceError, TransformRequest};
use crate::config::PipelineConfig;
use crate::decode::{decode_upload, Raster};
use crate::encode::{decode_data_uri, mask_to_data_uri, raster_to_data_uri, EncodeError};
use crate::mask::{CommittedMask, CropRect, MaskError, MaskSurface};
use crate::transform::{crop_to_rect, TransformError};

/// Smallest and largest palette a reduction may ask for.
pub const PALETTE_RANGE: std::ops::RangeInclusive<u16> = 2..=256;

/// Reasons an edit did not happen.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Another edit is still in progress")]
    Busy,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid selection: {0}")]
    Mask(#[from] MaskError),

    #[error("Invalid crop: {0}")]
    Crop(#[from] TransformError),

    #[error("Could not prepare request: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl EditError {
    /// Rejected before any external call was made.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Mask(_) | Self::Crop(_))
    }

    /// Worth offering a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Service(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Clears the in-flight flag when dropped, including on cancellation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, EditError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EditError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs destructive edits against one working raster.
pub struct EditDispatcher<S> {
    service: S,
    config: PipelineConfig,
    history: Mutex<EditHistory>,
    in_flight: AtomicBool,
}

impl<S: PixelTransformService> EditDispatcher<S> {
    /// Start editing `base`.
    pub fn new(service: S, config: PipelineConfig, base: RasterRef) -> Self {
        Self {
            service,
            config,
            history: Mutex::new(EditHistory::new(base)),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// True while an operation is pending.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The current working raster.
    pub fn current(&self) -> RasterRef {
        self.with_history(|h| h.current().clone())
    }

    pub fn can_undo(&self) -> bool {
        !self.is_busy() && self.with_history(|h| h.can_undo())
    }

    /// Replace the working raster with a new base, e.g. after a fresh
    /// conversion. Drops the undo slot.
    pub fn load(&self, base: RasterRef) -> Result<(), EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        self.with_history(|h| h.reset(base));
        Ok(())
    }

    /// Restore the raster from before the last edit.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    pub fn undo(&self) -> Result<Option<RasterRef>, EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        Ok(self.with_history(|h| h.undo().then(|| h.current().clone())))
    }

    /// Isolate the subject; the result usually has a transparent background.
    pub async fn remove_background(&self) -> Result<RasterRef, EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let current = self.current();
        let request = TransformRequest {
            operation: OperationKind::RemoveBackground,
            image: raster_to_data_uri(&current.raster)?,
            mask: None,
            prompt: None,
            colors: None,
        };
        self.run(request).await
    }

    /// Remove the masked region and fill it following `instruction`.
    ///
    /// A missing or blank instruction falls back to the configured default.
    /// The surface is cleared on success.
    pub async fn fill_masked(
        &self,
        surface: &mut MaskSurface,
        instruction: Option<&str>,
    ) -> Result<RasterRef, EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let current = self.current();
        let mask = commit_for(surface, &current.raster)?;

        let prompt = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.config.default_fill_instruction.as_str())
            .to_string();

        let request = TransformRequest {
            operation: OperationKind::FillMasked,
            image: raster_to_data_uri(&current.raster)?,
            mask: Some(mask_to_data_uri(&mask)?),
            prompt: Some(prompt),
            colors: None,
        };
        let result = self.run(request).await?;
        surface.clear();
        Ok(result)
    }

    /// Structurally erase the masked object. The surface is cleared on success.
    pub async fn erase_masked(&self, surface: &mut MaskSurface) -> Result<RasterRef, EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let current = self.current();
        let mask = commit_for(surface, &current.raster)?;

        let request = TransformRequest {
            operation: OperationKind::EraseMasked,
            image: raster_to_data_uri(&current.raster)?,
            mask: Some(mask_to_data_uri(&mask)?),
            prompt: None,
            colors: None,
        };
        let result = self.run(request).await?;
        surface.clear();
        Ok(result)
    }

    /// Reduce the raster to `colors` colors.
    pub async fn reduce_palette(&self, colors: u16) -> Result<RasterRef, EditError> {
        if !PALETTE_RANGE.contains(&colors) {
            return Err(EditError::InvalidInput(format!(
                "palette size {} is outside {}..={}",
                colors,
                PALETTE_RANGE.start(),
                PALETTE_RANGE.end()
            )));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let current = self.current();
        let request = TransformRequest {
            operation: OperationKind::ReducePalette,
            image: raster_to_data_uri(&current.raster)?,
            mask: None,
            prompt: None,
            colors: Some(colors),
        };
        self.run(request).await
    }

    /// Crop to a display rectangle scaled by `scale` into native pixels.
    ///
    /// Local and synchronous; still counts as a destructive edit.
    pub fn crop(&self, rect: &CropRect, scale: f64) -> Result<RasterRef, EditError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        let current = self.current();
        let cropped = crop_to_rect(&current.raster, rect, scale)?;
        log::info!(
            "crop {}x{} -> {}x{}",
            current.raster.width,
            current.raster.height,
            cropped.width,
            cropped.height
        );
        Ok(self.install(RasterRef::new(cropped, None)))
    }

    /// Crop to the rectangle drawn on `surface`, mapped through its own
    /// display transform. On success the surface is cleared and re-bound to
    /// the cropped raster at the same scale.
    pub fn crop_selection(&self, surface: &mut MaskSurface) -> Result<RasterRef, EditError> {
        let rect = surface.commit_rect()?;
        let transform = surface.transform();
        if !transform.is_valid() {
            return Err(MaskError::InvalidTransform {
                scale_x: transform.scale_x,
                scale_y: transform.scale_y,
            }
            .into());
        }
        let result = self.crop(&rect.to_native(&transform), 1.0)?;
        surface.rebind_native(result.raster.width, result.raster.height);
        Ok(result)
    }

    /// Call the service, resolve its answer to pixels, and install them.
    async fn run(&self, request: TransformRequest) -> Result<RasterRef, EditError> {
        let operation = request.operation;
        log::info!("dispatching {}", operation);

        let outcome = async {
            let image_ref = self.service.transform(request).await?.into_image_ref()?;
            let raster = self.fetch_raster(&image_ref).await?;
            Ok::<_, ServiceError>(RasterRef::new(raster, Some(image_ref)))
        }
        .await;

        match outcome {
            Ok(next) => {
                log::info!(
                    "{} succeeded ({}x{})",
                    operation,
                    next.raster.width,
                    next.raster.height
                );
                Ok(self.install(next))
            }
            Err(e) => {
                log::warn!("{} failed: {}", operation, e);
                Err(e.into())
            }
        }
    }

    async fn fetch_raster(&self, image_ref: &ImageRef) -> Result<Raster, ServiceError> {
        let bytes = match image_ref {
            ImageRef::DataUri(uri) => {
                decode_data_uri(uri).map_err(|e| ServiceError::MalformedResponse(e.to_string()))?
            }
            ImageRef::Url(url) => self.service.fetch_image(url).await?,
        };
        decode_upload(&bytes, &self.config)
            .map_err(|e| ServiceError::MalformedResponse(format!("result image: {}", e)))
    }

    fn install(&self, next: RasterRef) -> RasterRef {
        self.with_history(|h| {
            h.install(next);
            h.current().clone()
        })
    }

    fn with_history<T>(&self, f: impl FnOnce(&mut EditHistory) -> T) -> T {
        // History updates are single assignments, never half applied
        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut history)
    }
}

fn commit_for(surface: &MaskSurface, raster: &Raster) -> Result<CommittedMask, EditError> {
    // A surface still bound to a raster of another size would misplace
    // every stroke
    if surface.transform().is_valid() && !surface.fits_native(raster.width, raster.height) {
        let (mask_width, mask_height) = surface.native_extent();
        return Err(MaskError::DimensionMismatch {
            mask_width,
            mask_height,
            raster_width: raster.width,
            raster_height: raster.height,
        }
        .into());
    }
    Ok(surface.commit(raster.width, raster.height)?)
}
