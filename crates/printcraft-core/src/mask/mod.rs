//! Selection masks.
//!
//! Authoring happens on a [`MaskSurface`] in display coordinates. A commit
//! yields a [`CommittedMask`] at the native resolution of the working
//! raster, which is what edit operations consume.

mod committed;
mod geometry;
mod surface;

pub use committed::{CommittedMask, KEPT, SELECTED};
pub use geometry::{CropRect, DisplayTransform, Point};
pub use surface::{MaskError, MaskSurface, SelectionMode, SurfaceSettings};
