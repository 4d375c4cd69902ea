//! API token domain entities.

pub mod model;
pub mod status;

pub use model::{NewToken, Token, TokenChanges, generate_key};
pub use status::TokenStatus;
