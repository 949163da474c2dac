//! Image encoding for Printcraft.
//!
//! This module provides functionality for:
//! - Encoding rasters and masks to PNG
//! - Embedding encoded images as `data:` URIs for service requests
//! - Compositing transparent results over a checkerboard for display
//!
//! # Examples
//!
//! ```ignore
//! use printcraft_core::encode::raster_to_data_uri;
//!
//! let uri = raster_to_data_uri(&raster).unwrap();
//! assert!(uri.starts_with("data:image/png;base64,"));
//! ```

mod checkerboard;
mod data_uri;
mod png;

pub use checkerboard::composite_over_checkerboard;
pub use data_uri::{decode_data_uri, is_image_data_uri, mask_to_data_uri, raster_to_data_uri, to_data_uri};
pub use png::{encode_mask_png, encode_png, EncodeError};
