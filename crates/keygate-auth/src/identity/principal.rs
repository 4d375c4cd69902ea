//! The per-request identity.

use serde::Serialize;
use uuid::Uuid;

use keygate_entity::user::{Role, User, UserStatus};

use crate::session::SessionIdentity;

/// Which credential established the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    Session,
    /// A user's personal access token from the `Authorization` header.
    AccessToken,
    /// A quota-bearing API token.
    ApiToken { token_id: Uuid },
}

/// An authenticated caller. Built per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
    pub origin: Origin,
}

impl Principal {
    pub fn from_user(user: &User, origin: Origin) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            status: user.status,
            origin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// The API token behind this identity, if any.
    pub fn token_id(&self) -> Option<Uuid> {
        match self.origin {
            Origin::ApiToken { token_id } => Some(token_id),
            _ => None,
        }
    }
}

impl From<SessionIdentity> for Principal {
    fn from(session: SessionIdentity) -> Self {
        Self {
            id: session.id,
            username: session.username,
            role: session.role,
            status: session.status,
            origin: Origin::Session,
        }
    }
}
