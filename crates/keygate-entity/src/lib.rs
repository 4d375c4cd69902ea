//! # keygate-entity
//!
//! Domain entity models for Keygate. Every struct in this crate
//! represents a database row or a domain value object. Row types derive
//! `sqlx::FromRow`; the enums are stored as their integer codes.

pub mod token;
pub mod user;

pub use token::{NewToken, Token, TokenChanges, TokenStatus};
pub use user::{NewUser, Role, User, UserChanges, UserStatus};
