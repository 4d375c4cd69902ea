//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use keygate_auth::Origin;
use keygate_entity::token::Token;
use keygate_entity::user::{Role, UserStatus};

/// `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub register_enabled: bool,
    pub password_register_enabled: bool,
    pub password_login_enabled: bool,
    /// The caller, when a session or access token was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CallerResponse>,
}

/// Identity summary for the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CallerResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
    pub origin: Origin,
}

/// `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `POST /api/usage`.
#[derive(Debug, Clone, Serialize)]
pub struct UsageResponse {
    pub token_id: Uuid,
    pub name: String,
    pub charged: i64,
    /// Omitted for unlimited tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<i64>,
    pub unlimited_quota: bool,
    pub expires_at: DateTime<Utc>,
}

impl UsageResponse {
    pub fn new(token: &Token, charged: i64) -> Self {
        Self {
            token_id: token.id,
            name: token.name.clone(),
            charged,
            remaining_quota: (!token.unlimited_quota).then_some(token.remaining_quota),
            unlimited_quota: token.unlimited_quota,
            expires_at: token.expires_at,
        }
    }
}
