//! Printcraft Core - Image pipeline for garment mockups
//!
//! This crate provides the native half of the Printcraft design flow:
//! orientation-correct upload decoding, brush and rectangle mask authoring,
//! destructive edits against external transformation services with one
//! level of undo, and the resumable stage pipeline that ties them together.

pub mod config;
pub mod decode;
pub mod edit;
pub mod encode;
pub mod mask;
pub mod pipeline;
pub mod transform;

pub use config::{ConfigError, PipelineConfig};
pub use decode::{normalize_upload, resolve_orientation, DecodeError, NormalizedUpload, Orientation, Raster};
pub use edit::{EditDispatcher, EditError, ImageRef, PixelTransformService, RasterRef};
pub use mask::{CommittedMask, CropRect, DisplayTransform, MaskSurface, SelectionMode};
pub use pipeline::{ArtifactStore, PipelineError, PipelineStage, PipelineStateMachine};
pub use transform::{apply_orientation, crop_to_rect, TransformError};
