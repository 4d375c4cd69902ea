//! # keygate-api
//!
//! HTTP API layer for Keygate built on Axum.
//!
//! Provides the REST endpoints, the gate middleware (rate limiting,
//! session/access-token auth, role floors, API token auth), extractors,
//! DTOs, and error mapping onto the JSON envelope.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{ensure_root_account, run_server};
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
