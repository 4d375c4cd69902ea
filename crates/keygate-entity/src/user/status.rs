//! User account status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

use keygate_core::AppError;

/// Account status for a user. Code 0 is reserved and never decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(try_from = "i32", into = "i32")]
pub enum UserStatus {
    /// Account is active and can act.
    Enabled = 1,
    /// Account is deactivated by an admin.
    Disabled = 2,
}

impl UserStatus {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Return the status as a lowercase string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl TryFrom<i32> for UserStatus {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Enabled),
            2 => Ok(Self::Disabled),
            _ => Err(AppError::validation(format!(
                "Invalid user status: {value}. Expected 1 (enabled) or 2 (disabled)"
            ))),
        }
    }
}

impl From<UserStatus> for i32 {
    fn from(status: UserStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_reserved() {
        assert!(UserStatus::try_from(0).is_err());
        assert!(serde_json::from_str::<UserStatus>("0").is_err());
    }

    #[test]
    fn codes() {
        assert_eq!(UserStatus::try_from(1).unwrap(), UserStatus::Enabled);
        assert_eq!(UserStatus::Disabled.code(), 2);
    }
}
