//! Custom Axum extractors.

pub mod auth;
pub mod pagination;
pub mod path;

pub use auth::{ApiToken, AuthPrincipal, MaybePrincipal};
pub use pagination::PaginationParams;
pub use path::parse_uuid;
