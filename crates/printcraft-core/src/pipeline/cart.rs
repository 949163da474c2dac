//! The commerce cart, as seen from the pipeline.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Cart lookup failed: {0}")]
pub struct CartError(pub String);

/// Read-only view of the external shopping cart.
#[allow(async_fn_in_trait)]
pub trait CartInspector {
    /// Number of line items currently in the cart.
    async fn item_count(&self) -> Result<usize, CartError>;
}
