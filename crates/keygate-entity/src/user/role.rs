//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use keygate_core::AppError;

/// Ranked roles. Authorization is a numeric floor check on [`Role::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    Guest = 0,
    Common = 1,
    Admin = 10,
    Root = 100,
}

impl Role {
    /// The stored integer rank.
    pub fn rank(self) -> i32 {
        self as i32
    }

    /// Check if this role is at least `floor`.
    pub fn has_at_least(self, floor: Role) -> bool {
        self.rank() >= floor.rank()
    }

    pub fn is_admin(self) -> bool {
        self.has_at_least(Self::Admin)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Common => "common",
            Self::Admin => "admin",
            Self::Root => "root",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl TryFrom<i32> for Role {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Guest),
            1 => Ok(Self::Common),
            10 => Ok(Self::Admin),
            100 => Ok(Self::Root),
            _ => Err(AppError::validation(format!(
                "Invalid role: {value}. Expected one of: 0, 1, 10, 100"
            ))),
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "common" => Ok(Self::Common),
            "admin" => Ok(Self::Admin),
            "root" => Ok(Self::Root),
            _ => Err(AppError::validation(format!(
                "Invalid role: '{s}'. Expected one of: guest, common, admin, root"
            ))),
        }
    }
}
