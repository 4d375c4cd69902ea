//! API token validation and quota accounting.

pub mod evaluator;

pub use evaluator::{TokenLifecycleEvaluator, TokenRejection};
