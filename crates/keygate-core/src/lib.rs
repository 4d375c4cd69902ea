//! # keygate-core
//!
//! Core crate for Keygate. Contains configuration schemas, pagination
//! and response envelope types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Keygate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
