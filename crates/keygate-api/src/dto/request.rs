//! Request DTOs with validation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use keygate_entity::token::TokenStatus;
use keygate_entity::user::{Role, UserStatus};

/// Self-registration body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 12, message = "must be 1 to 12 characters"))]
    pub username: String,
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub email: String,
}

/// Login body. `username` may also be an email address.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `PUT /api/user/self`. Empty or missing fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSelfRequest {
    #[validate(length(max = 12, message = "must be at most 12 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Admin user creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 12, message = "must be 1 to 12 characters"))]
    pub username: String,
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub display_name: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub status: Option<UserStatus>,
}

fn default_role() -> Role {
    Role::Common
}

/// Admin user update. `id` names the target.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub id: String,
    #[validate(length(min = 1, max = 12, message = "must be 1 to 12 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

/// New API token.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[serde(default)]
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub name: String,
    /// Overrides the configured validity.
    pub expires_at: Option<DateTime<Utc>>,
    /// Admin only. Defaults to 0.
    #[validate(range(min = 0, message = "must not be negative"))]
    pub remaining_quota: Option<i64>,
    /// Admin only. Defaults to false.
    pub unlimited_quota: Option<bool>,
}

/// API token update. Owner, key and creation time never change.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTokenRequest {
    pub id: String,
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub name: Option<String>,
    pub status: Option<TokenStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Admin only.
    #[validate(range(min = 0, message = "must not be negative"))]
    pub remaining_quota: Option<i64>,
    /// Admin only.
    pub unlimited_quota: Option<bool>,
}

/// Quota usage report from an API token holder.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UsageRequest {
    #[serde(default = "default_units")]
    #[validate(range(min = 1, message = "must be positive"))]
    pub units: i64,
}

fn default_units() -> i64 {
    1
}
