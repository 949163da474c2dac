//! Destructive edits against external pixel-transformation services.
//!
//! - [`EditHistory`] keeps the current raster plus one undo step.
//! - [`PixelTransformService`] is the seam to the external capabilities;
//!   enable the `http` feature for a `reqwest` implementation.
//! - [`EditDispatcher`] validates input, runs one operation at a time, and
//!   installs results.

mod dispatcher;
mod history;
#[cfg(feature = "http")]
mod http;
mod service;

pub use dispatcher::{EditDispatcher, EditError, PALETTE_RANGE};
pub use history::{EditHistory, RasterRef};
#[cfg(feature = "http")]
pub use http::HttpTransformService;
pub use service::{
    ImageRef, OperationKind, PixelTransformService, ServiceError, TransformRequest, TransformResponse,
};
