//! # keygate-auth
//!
//! The request gate for Keygate.
//!
//! ## Modules
//!
//! - `session`: signed session capability (encode and validated decode)
//! - `identity`: resolving a request's session or bearer header to a [`Principal`]
//! - `token`: API token lifecycle evaluation and quota charging
//! - `rbac`: role floor and account status checks
//! - `rate_limit`: per-scope, per-client token bucket registry
//! - `password`: Argon2id password hashing and policy enforcement

pub mod identity;
pub mod password;
pub mod rate_limit;
pub mod rbac;
pub mod session;
pub mod token;

pub use identity::{IdentityResolver, Origin, Principal, ResolveError};
pub use password::{PasswordHasher, PasswordValidator};
pub use rate_limit::{RateLimiterRegistry, Scope};
pub use rbac::{AuthzOutcome, authorize};
pub use session::{SessionClaims, SessionCodec};
pub use token::{TokenLifecycleEvaluator, TokenRejection};
