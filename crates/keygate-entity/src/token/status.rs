//! API token status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

use keygate_core::AppError;

/// Lifecycle status of an API token.
///
/// `Expired` and `Exhausted` are set lazily when a validation observes the
/// condition; `Disabled` is only ever set by an owner or admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(try_from = "i32", into = "i32")]
pub enum TokenStatus {
    Enabled = 1,
    Disabled = 2,
    Expired = 3,
    Exhausted = 4,
}

impl TokenStatus {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Expired => "expired",
            Self::Exhausted => "exhausted",
        }
    }
}

impl TryFrom<i32> for TokenStatus {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Enabled),
            2 => Ok(Self::Disabled),
            3 => Ok(Self::Expired),
            4 => Ok(Self::Exhausted),
            _ => Err(AppError::validation(format!(
                "Invalid token status: {value}. Expected 1, 2, 3 or 4"
            ))),
        }
    }
}

impl From<TokenStatus> for i32 {
    fn from(status: TokenStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_reserved() {
        assert!(TokenStatus::try_from(0).is_err());
    }

    #[test]
    fn json_uses_codes() {
        assert_eq!(serde_json::to_string(&TokenStatus::Exhausted).unwrap(), "4");
        assert_eq!(
            serde_json::from_str::<TokenStatus>("3").unwrap(),
            TokenStatus::Expired
        );
    }
}
