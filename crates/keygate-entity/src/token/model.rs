//! API token entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::TokenStatus;

/// A quota-bearing API credential owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Token {
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Random 32-character hex key. Immutable once issued.
    pub key: String,
    pub name: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_quota: i64,
    /// When set, quota is never checked or decremented.
    pub unlimited_quota: bool,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Strictly past the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_exhausted(&self) -> bool {
        !self.unlimited_quota && self.remaining_quota <= 0
    }

    /// Whether `units` can be charged without going negative.
    pub fn can_afford(&self, units: i64) -> bool {
        self.unlimited_quota || self.remaining_quota >= units
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether an automatic move to `to` is allowed at `now`.
    ///
    /// Only a live `Enabled` token moves, and only to `Expired` once past
    /// its expiry or to `Exhausted` once out of quota.
    pub fn transition_due(&self, to: TokenStatus, now: DateTime<Utc>) -> bool {
        if self.is_deleted() || !self.status.is_enabled() {
            return false;
        }
        match to {
            TokenStatus::Expired => self.is_expired_at(now),
            TokenStatus::Exhausted => self.is_exhausted(),
            TokenStatus::Enabled | TokenStatus::Disabled => false,
        }
    }
}

/// Generate a fresh token key: a v4 UUID without hyphens.
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Data required to issue a new token.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: Uuid,
    pub key: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub remaining_quota: i64,
    pub unlimited_quota: bool,
}

impl NewToken {
    /// A new token with a generated key, valid for `validity_days` from now.
    pub fn issue(
        user_id: Uuid,
        name: impl Into<String>,
        validity_days: i64,
        remaining_quota: i64,
        unlimited_quota: bool,
    ) -> Self {
        Self {
            user_id,
            key: generate_key(),
            name: name.into(),
            expires_at: Utc::now() + Duration::days(validity_days),
            remaining_quota,
            unlimited_quota,
        }
    }
}

/// Partial update of a token. The key is not updatable.
#[derive(Debug, Clone, Default)]
pub struct TokenChanges {
    pub name: Option<String>,
    pub status: Option<TokenStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_quota: Option<i64>,
    pub unlimited_quota: Option<bool>,
}

impl TokenChanges {
    pub fn status(status: TokenStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, token: &mut Token) {
        if let Some(name) = &self.name {
            token.name = name.clone();
        }
        if let Some(status) = self.status {
            token.status = status;
        }
        if let Some(expires_at) = self.expires_at {
            token.expires_at = expires_at;
        }
        if let Some(quota) = self.remaining_quota {
            token.remaining_quota = quota;
        }
        if let Some(unlimited) = self.unlimited_quota {
            token.unlimited_quota = unlimited;
        }
    }
}
