//! # keygate-database
//!
//! PostgreSQL connection management, repositories for users and API
//! tokens, and the [`CredentialStore`] seam the auth layer is written
//! against. [`MemoryCredentialStore`] backs tests and local runs.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryCredentialStore;
pub use store::{CredentialStore, PgCredentialStore};
