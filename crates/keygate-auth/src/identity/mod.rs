//! Request identity: who is calling and through which credential.

pub mod principal;
pub mod resolver;

pub use principal::{Origin, Principal};
pub use resolver::{IdentityResolver, ResolveError};
