//! Upload decoding for Printcraft.
//!
//! This module provides functionality for:
//! - Reading the EXIF orientation of an uploaded photo
//! - Decoding common photographic formats into an RGBA [`Raster`]
//! - Normalizing uploads to an upright raster, with fallback
//!
//! # Failure policy
//!
//! Orientation is best-effort. Missing or malformed metadata resolves to
//! [`Orientation::Normal`] and never fails an upload; only an undecodable
//! or oversized image does.
//!
//! # Examples
//!
//! ```ignore
//! use printcraft_core::config::PipelineConfig;
//! use printcraft_core::decode::normalize_upload;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let upload = normalize_upload(&bytes, &PipelineConfig::default()).unwrap();
//! println!("{}x{} upright", upload.raster.width, upload.raster.height);
//! ```

mod orientation;
mod types;
mod upload;

#[cfg(test)]
pub(crate) use orientation::fixtures;
pub use orientation::{has_jpeg_signature, read_orientation_code, resolve_orientation, OrientationParseError};
pub use types::{DecodeError, Orientation, Raster, CHANNELS};
pub use upload::{decode_upload, normalize_upload, NormalizedUpload};
