//! Authorization gate.

use keygate_core::error::AppError;
use keygate_core::result::AppResult;
use keygate_entity::user::{Role, UserStatus};

use crate::identity::Principal;

/// The gate's verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzOutcome {
    Allowed,
    InsufficientRole,
    AccountDisabled,
}

impl AuthzOutcome {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::InsufficientRole => Err(AppError::insufficient_role(
                "insufficient permission for this operation",
            )),
            Self::AccountDisabled => Err(AppError::account_disabled("account has been disabled")),
        }
    }
}

/// Check `principal` against a role floor.
///
/// The role floor is checked first, so a disabled user below the floor is
/// reported as `InsufficientRole`.
pub fn authorize(principal: &Principal, required: Role) -> AuthzOutcome {
    if !principal.role.has_at_least(required) {
        return AuthzOutcome::InsufficientRole;
    }
    if principal.status != UserStatus::Enabled {
        return AuthzOutcome::AccountDisabled;
    }
    AuthzOutcome::Allowed
}

/// Whether an actor may modify or delete a user holding `target`.
pub fn can_manage(actor: Role, target: Role) -> bool {
    actor > target
}

/// Whether an actor may grant `role` to another user.
pub fn can_assign(actor: Role, role: Role) -> bool {
    actor > role
}
