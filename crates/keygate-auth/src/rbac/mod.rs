//! Role floor and account status checks.

pub mod enforcer;

pub use enforcer::{AuthzOutcome, authorize, can_assign, can_manage};
