//! The multi-stage design pipeline.
//!
//! A session moves through `upload → style → convert → edit → color-reduce
//! → preview`, with `before` as a side view of the conversion. Every
//! stage's output lives in an [`ArtifactStore`] so the session survives a
//! restart.

mod cart;
mod composition;
mod machine;
mod rate_limit;
mod stage;
mod store;

pub use cart::{CartError, CartInspector};
pub use composition::{CompositionRequest, Placement};
pub use machine::{ClearOutcome, PipelineError, PipelineStateMachine};
pub use rate_limit::{
    format_retry_after, InMemoryRateLimitStore, RateDecision, RateLimitEntry, RateLimitStore, RateLimiter,
};
pub use stage::{keys, PipelineStage};
pub use store::{ArtifactStore, JsonFileArtifactStore, MemoryArtifactStore, StoreError};
