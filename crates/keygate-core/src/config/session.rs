//! Session cookie configuration.

use serde::{Deserialize, Serialize};

/// Session cookie configuration.
///
/// The session is a signed capability stored in a cookie. An empty
/// `secret` is replaced with a random per-process value at load time,
/// which invalidates every outstanding session on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret used to sign session payloads.
    #[serde(default)]
    pub secret: String,
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Session lifetime in days.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    /// Whether to set the `Secure` attribute on the cookie.
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: default_cookie_name(),
            max_age_days: default_max_age_days(),
            secure_cookie: false,
        }
    }
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_max_age_days() -> i64 {
    30
}
