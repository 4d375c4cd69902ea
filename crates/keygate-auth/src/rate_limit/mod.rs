//! Per-scope, per-client request rate limiting.

pub mod bucket;
pub mod registry;

pub use bucket::TokenBucket;
pub use registry::{RateLimiterRegistry, Scope};
