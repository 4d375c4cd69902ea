//! Signed session capability.
//!
//! Login issues an HS256 JWT carrying the account's id, username, role and
//! status. Reads decode the payload as an untyped JSON object and validate
//! every field on each request.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use keygate_core::config::SessionConfig;
use keygate_core::error::AppError;
use keygate_entity::user::{Role, User, UserStatus};

/// Payload written into the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: Uuid,
    pub username: String,
    pub role: i32,
    pub status: i32,
    pub iat: i64,
    pub exp: i64,
}

/// A validated session payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
}

/// Encodes and validates session cookies with the service's session secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    max_age: Duration,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl SessionCodec {
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            max_age: Duration::days(config.max_age_days),
        }
    }

    /// Session lifetime, also used as the cookie `Max-Age`.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Issue a session for a freshly authenticated user.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = SessionClaims {
            id: user.id,
            username: user.username.clone(),
            role: user.role.rank(),
            status: user.status.code(),
            iat: now.timestamp(),
            exp: (now + self.max_age).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session: {e}")))
    }

    /// Decode a session cookie.
    ///
    /// A bad signature, an expired payload, or an empty username yields
    /// `Ok(None)`: the request simply has no session. A payload with a
    /// username but an unusable id, role or status is `InvalidCredential`.
    pub fn decode(&self, cookie: &str) -> Result<Option<SessionIdentity>, AppError> {
        if cookie.is_empty() {
            return Ok(None);
        }

        let payload = match decode::<Map<String, Value>>(cookie, &self.decoding_key, &self.validation)
        {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Ignoring unverifiable session");
                return Ok(None);
            }
        };

        let username = match payload.get("username").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(None),
        };

        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| malformed("id"))?;
        let role = int_field(&payload, "role")
            .and_then(|code| Role::try_from(code).ok())
            .ok_or_else(|| malformed("role"))?;
        let status = int_field(&payload, "status")
            .and_then(|code| UserStatus::try_from(code).ok())
            .ok_or_else(|| malformed("status"))?;

        Ok(Some(SessionIdentity {
            id,
            username,
            role,
            status,
        }))
    }
}

fn int_field(payload: &Map<String, Value>, field: &str) -> Option<i32> {
    payload
        .get(field)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

fn malformed(field: &str) -> AppError {
    AppError::invalid_credential(format!("Session field '{field}' is malformed"))
}

#[cfg(test)]
mod tests {
    use keygate_core::error::ErrorKind;

    use super::*;

    fn codec(secret: &str) -> SessionCodec {
        SessionCodec::new(&SessionConfig {
            secret: secret.to_string(),
            ..SessionConfig::default()
        })
    }

    fn user(username: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: String::new(),
            display_name: username.to_string(),
            email: String::new(),
            role: Role::Admin,
            status: UserStatus::Enabled,
            access_token: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn sign(secret: &str, payload: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn exp() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    #[test]
    fn issued_session_decodes() {
        let codec = codec("k");
        let alice = user("alice");
        let cookie = codec.issue(&alice).unwrap();
        let identity = codec.decode(&cookie).unwrap().unwrap();
        assert_eq!(identity.id, alice.id);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.status, UserStatus::Enabled);
    }

    #[test]
    fn foreign_signature_is_absent() {
        let cookie = codec("other").issue(&user("alice")).unwrap();
        assert!(codec("k").decode(&cookie).unwrap().is_none());
        assert!(codec("k").decode("garbage").unwrap().is_none());
    }

    #[test]
    fn empty_username_is_absent() {
        let cookie = sign(
            "k",
            serde_json::json!({
                "id": Uuid::new_v4().to_string(), "username": "",
                "role": 1, "status": 1, "exp": exp()
            }),
        );
        assert!(codec("k").decode(&cookie).unwrap().is_none());
    }

    #[test]
    fn malformed_role_is_invalid_credential() {
        let cookie = sign(
            "k",
            serde_json::json!({
                "id": Uuid::new_v4().to_string(), "username": "alice",
                "role": "admin", "status": 1, "exp": exp()
            }),
        );
        let err = codec("k").decode(&cookie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredential);
    }

    #[test]
    fn reserved_status_is_invalid_credential() {
        let cookie = sign(
            "k",
            serde_json::json!({
                "id": Uuid::new_v4().to_string(), "username": "alice",
                "role": 1, "status": 0, "exp": exp()
            }),
        );
        let err = codec("k").decode(&cookie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredential);
    }

    #[test]
    fn expired_session_is_absent() {
        let cookie = sign(
            "k",
            serde_json::json!({
                "id": Uuid::new_v4().to_string(), "username": "alice",
                "role": 1, "status": 1,
                "exp": (Utc::now() - Duration::hours(1)).timestamp()
            }),
        );
        assert!(codec("k").decode(&cookie).unwrap().is_none());
    }
}
