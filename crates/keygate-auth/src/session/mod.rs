//! Session cookie encoding and validation.

pub mod codec;

pub use codec::{SessionClaims, SessionCodec, SessionIdentity};
