//! The pipeline state machine.
//!
//! Tracks the selected stage and every stage's output in an
//! [`ArtifactStore`], so a session can be resumed after a restart.
//!
//! ## Rules
//!
//! - Forward moves go one stage at a time and need the predecessor's
//!   artifact. `before` is entered from `convert` only.
//! - Backward moves are free while the target is still reachable.
//!   Navigating never deletes anything.
//! - Recording a new upload or conversion invalidates everything derived
//!   from the old one.
//! - `clear_all` asks the cart first and keeps cart-linked keys while the
//!   cart has items.

use std::time::Duration;

use thiserror::Error;

use super::cart::CartInspector;
use super::composition::{CompositionRequest, Placement};
use super::rate_limit::{format_retry_after, RateDecision, RateLimitStore, RateLimiter};
use super::stage::{keys, PipelineStage};
use super::store::{ArtifactStore, StoreError};
use crate::edit::ImageRef;

/// Errors raised by pipeline transitions.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot enter {stage}: the {missing} result is missing")]
    MissingArtifact {
        stage: PipelineStage,
        missing: PipelineStage,
    },

    #[error("Cannot go from {from} to {to}")]
    IllegalTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("Cannot move past {0}")]
    EndOfPipeline(PipelineStage),

    #[error("Conversion limit reached, try again in {message}")]
    RateLimited { retry_after: Duration, message: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a clear-all request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    /// True when cart-linked keys were kept because the cart had items
    /// (or could not be checked).
    pub preserved_cart_data: bool,
}

/// Sequences the design pipeline over a durable artifact store.
#[derive(Debug)]
pub struct PipelineStateMachine<A> {
    store: A,
    stage: PipelineStage,
}

impl<A: ArtifactStore> PipelineStateMachine<A> {
    /// Open a session over `store`, resuming its saved stage.
    pub fn open(store: A) -> Result<Self, PipelineError> {
        let mut machine = Self {
            store,
            stage: PipelineStage::Upload,
        };
        machine.resume()?;
        Ok(machine)
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn into_store(self) -> A {
        self.store
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Image artifact produced by `stage`, if it exists.
    ///
    /// Values that are not image references read as missing.
    pub fn artifact(&self, stage: PipelineStage) -> Result<Option<ImageRef>, PipelineError> {
        match stage {
            PipelineStage::Style | PipelineStage::Before => Ok(None),
            _ => match stage.artifact_key() {
                Some(key) => self.image_at(key),
                None => Ok(None),
            },
        }
    }

    /// The selected style, if one was chosen.
    pub fn style(&self) -> Result<Option<String>, PipelineError> {
        Ok(self.store.get(keys::SELECTED_STYLE)?)
    }

    pub fn position(&self) -> Result<Option<String>, PipelineError> {
        Ok(self.store.get(keys::SELECTED_POSITION)?)
    }

    pub fn zoom(&self) -> Result<Option<f64>, PipelineError> {
        Ok(self
            .store
            .get(keys::ZOOM_LEVEL)?
            .and_then(|z| z.parse::<f64>().ok())
            .filter(|z| z.is_finite() && *z > 0.0))
    }

    /// The predecessor whose artifact `stage` still lacks, if any.
    pub fn missing_requirement(&self, stage: PipelineStage) -> Result<Option<PipelineStage>, PipelineError> {
        use PipelineStage::*;

        let required: &[PipelineStage] = match stage {
            Upload => &[],
            Style => &[Upload],
            Convert => &[Upload, Style],
            Before => &[Upload, Convert],
            Edit | ColorReduce | Preview => &[Convert],
        };
        for &needed in required {
            if !self.has_artifact(needed)? {
                return Ok(Some(needed));
            }
        }
        Ok(None)
    }

    /// Whether `stage` has everything it needs.
    pub fn is_reachable(&self, stage: PipelineStage) -> Result<bool, PipelineError> {
        Ok(self.missing_requirement(stage)?.is_none())
    }

    /// Whether `go_to(target)` would succeed from the current stage.
    pub fn can_go_to(&self, target: PipelineStage) -> Result<bool, PipelineError> {
        Ok(self.is_legal_move(target) && self.is_reachable(target)?)
    }

    pub fn can_advance(&self) -> Result<bool, PipelineError> {
        match self.stage.next() {
            Some(next) => self.can_go_to(next),
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move to `target`.
    pub fn go_to(&mut self, target: PipelineStage) -> Result<(), PipelineError> {
        if target == self.stage {
            return Ok(());
        }
        if !self.is_legal_move(target) {
            return Err(PipelineError::IllegalTransition {
                from: self.stage,
                to: target,
            });
        }
        if let Some(missing) = self.missing_requirement(target)? {
            return Err(PipelineError::MissingArtifact {
                stage: target,
                missing,
            });
        }

        log::info!("pipeline {} -> {}", self.stage, target);
        self.set_stage(target)
    }

    /// Step forward along the main path.
    pub fn advance(&mut self) -> Result<PipelineStage, PipelineError> {
        let next = self.stage.next().ok_or(PipelineError::EndOfPipeline(self.stage))?;
        self.go_to(next)?;
        Ok(next)
    }

    /// Step back one stage.
    pub fn back(&mut self) -> Result<PipelineStage, PipelineError> {
        let previous = self
            .stage
            .previous()
            .ok_or(PipelineError::EndOfPipeline(self.stage))?;
        self.go_to(previous)?;
        Ok(previous)
    }

    /// Restore the saved stage, or the furthest reachable one when the
    /// saved stage is unknown or no longer reachable.
    pub fn resume(&mut self) -> Result<PipelineStage, PipelineError> {
        let saved = self
            .store
            .get(keys::SELECTED_STAGE)?
            .and_then(|s| s.parse::<PipelineStage>().ok());

        self.stage = match saved {
            Some(stage) if self.is_reachable(stage)? => stage,
            other => {
                let fallback = self.furthest_reachable()?;
                if let Some(stage) = other {
                    log::info!("saved stage {} is no longer reachable, resuming at {}", stage, fallback);
                }
                fallback
            }
        };
        Ok(self.stage)
    }

    // ------------------------------------------------------------------
    // Recording stage output
    // ------------------------------------------------------------------

    /// Record a new upload. Everything derived from the previous upload is
    /// dropped; the style choice is kept.
    pub fn record_upload(&mut self, image: &ImageRef) -> Result<(), PipelineError> {
        self.store.set(keys::UPLOADED_IMAGE, image.as_str())?;
        self.invalidate(&[
            PipelineStage::Convert,
            PipelineStage::Edit,
            PipelineStage::ColorReduce,
            PipelineStage::Preview,
        ])?;
        self.settle()
    }

    pub fn record_style(&mut self, style: &str) -> Result<(), PipelineError> {
        let style = style.trim();
        if style.is_empty() {
            return Err(PipelineError::InvalidValue("style name is empty".to_string()));
        }
        self.require(PipelineStage::Style)?;
        self.store.set(keys::SELECTED_STYLE, style)?;
        Ok(())
    }

    /// Record a fresh conversion, invalidating edit, color-reduce and
    /// preview results derived from the previous one.
    pub fn record_conversion(&mut self, image: &ImageRef) -> Result<(), PipelineError> {
        self.require(PipelineStage::Convert)?;
        self.store.set(keys::CONVERTED_IMAGE, image.as_str())?;
        self.invalidate(&[PipelineStage::Edit, PipelineStage::ColorReduce, PipelineStage::Preview])?;
        self.settle()
    }

    pub fn record_edit(&mut self, image: &ImageRef) -> Result<(), PipelineError> {
        self.require(PipelineStage::Edit)?;
        self.store.set(keys::EDITED_IMAGE, image.as_str())?;
        Ok(())
    }

    /// Forget the edit result, e.g. after undoing back to the conversion.
    pub fn discard_edit(&mut self) -> Result<(), PipelineError> {
        self.store.remove(keys::EDITED_IMAGE)?;
        Ok(())
    }

    pub fn record_color_reduction(&mut self, image: &ImageRef) -> Result<(), PipelineError> {
        self.require(PipelineStage::ColorReduce)?;
        self.store.set(keys::COLOR_REDUCED_IMAGE, image.as_str())?;
        Ok(())
    }

    pub fn record_preview(&mut self, image: &ImageRef) -> Result<(), PipelineError> {
        self.require(PipelineStage::Preview)?;
        self.store.set(keys::PREVIEW_IMAGE, image.as_str())?;
        Ok(())
    }

    /// Gate a conversion request through the rate limiter.
    pub fn request_conversion<R: RateLimitStore>(
        &self,
        limiter: &mut RateLimiter<R>,
        client_key: &str,
        now_ms: u64,
    ) -> Result<(), PipelineError> {
        self.require(PipelineStage::Convert)?;
        match limiter.check(client_key, now_ms) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Exceeded { retry_after } => Err(PipelineError::RateLimited {
                retry_after,
                message: format_retry_after(retry_after),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Session settings
    // ------------------------------------------------------------------

    pub fn set_position(&mut self, name: &str) -> Result<(), PipelineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::InvalidValue("position name is empty".to_string()));
        }
        self.store.set(keys::SELECTED_POSITION, name)?;
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), PipelineError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(PipelineError::InvalidValue(format!("zoom level {}", zoom)));
        }
        self.store.set(keys::ZOOM_LEVEL, &zoom.to_string())?;
        Ok(())
    }

    /// The finished design for garment compositing: the color-reduced
    /// result if present, else the edit, else the conversion.
    pub fn composition_request(&self, placement: Placement) -> Result<CompositionRequest, PipelineError> {
        let image = [PipelineStage::ColorReduce, PipelineStage::Edit, PipelineStage::Convert]
            .into_iter()
            .map(|stage| self.artifact(stage))
            .find_map(|result| result.transpose())
            .transpose()?
            .ok_or(PipelineError::MissingArtifact {
                stage: PipelineStage::Preview,
                missing: PipelineStage::Convert,
            })?;

        Ok(CompositionRequest {
            image,
            position: self.position()?,
            placement,
        })
    }

    /// Remove every artifact of the session.
    ///
    /// While the cart holds items (or its state cannot be determined) the
    /// cart-linked keys survive.
    pub async fn clear_all<C: CartInspector>(&mut self, cart: &C) -> Result<ClearOutcome, PipelineError> {
        let preserve = match cart.item_count().await {
            Ok(0) => false,
            Ok(count) => {
                log::info!("cart has {} item(s), keeping cart-linked data", count);
                true
            }
            Err(e) => {
                log::warn!("{}; keeping cart-linked data", e);
                true
            }
        };

        for key in keys::ALL {
            if preserve && keys::CART_LINKED.contains(&key) {
                continue;
            }
            self.store.remove(key)?;
        }
        self.stage = PipelineStage::Upload;
        log::info!("session cleared");

        Ok(ClearOutcome {
            preserved_cart_data: preserve,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_legal_move(&self, target: PipelineStage) -> bool {
        if target == self.stage {
            return true;
        }
        match target {
            PipelineStage::Before => self.stage == PipelineStage::Convert,
            _ if target.rank() < self.stage.rank() => true,
            _ => self.stage.next() == Some(target),
        }
    }

    fn require(&self, stage: PipelineStage) -> Result<(), PipelineError> {
        match self.missing_requirement(stage)? {
            Some(missing) => Err(PipelineError::MissingArtifact { stage, missing }),
            None => Ok(()),
        }
    }

    fn has_artifact(&self, stage: PipelineStage) -> Result<bool, PipelineError> {
        match stage {
            PipelineStage::Style => Ok(self.style()?.is_some_and(|s| !s.trim().is_empty())),
            _ => Ok(self.artifact(stage)?.is_some()),
        }
    }

    fn image_at(&self, key: &str) -> Result<Option<ImageRef>, PipelineError> {
        let Some(value) = self.store.get(key)? else {
            return Ok(None);
        };
        let parsed = ImageRef::parse(&value);
        if parsed.is_none() {
            log::warn!("ignoring stored {} that is not an image reference", key);
        }
        Ok(parsed)
    }

    fn invalidate(&mut self, stages: &[PipelineStage]) -> Result<(), PipelineError> {
        let mut cleared = Vec::new();
        for &stage in stages {
            if let Some(key) = stage.artifact_key() {
                if self.store.get(key)?.is_some() {
                    self.store.remove(key)?;
                    cleared.push(stage.as_str());
                }
            }
        }
        if !cleared.is_empty() {
            log::info!("invalidated downstream results: {}", cleared.join(", "));
        }
        Ok(())
    }

    /// Pull the current stage back if it lost its requirements.
    fn settle(&mut self) -> Result<(), PipelineError> {
        if !self.is_reachable(self.stage)? {
            let fallback = self.furthest_reachable()?;
            log::info!("pipeline {} -> {} (requirements invalidated)", self.stage, fallback);
            self.set_stage(fallback)?;
        }
        Ok(())
    }

    fn furthest_reachable(&self) -> Result<PipelineStage, PipelineError> {
        let mut furthest = PipelineStage::Upload;
        for stage in PipelineStage::MAIN_PATH {
            if self.is_reachable(stage)? {
                furthest = stage;
            }
        }
        Ok(furthest)
    }

    fn set_stage(&mut self, stage: PipelineStage) -> Result<(), PipelineError> {
        self.store.set(keys::SELECTED_STAGE, stage.as_str())?;
        self.stage = stage;
        Ok(())
    }
}
