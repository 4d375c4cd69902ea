//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Registration, login and credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Whether new accounts may be registered at all.
    #[serde(default = "default_true")]
    pub register_enabled: bool,
    /// Whether registration with a username and password is allowed.
    #[serde(default = "default_true")]
    pub password_register_enabled: bool,
    /// Whether login with a username and password is allowed.
    #[serde(default = "default_true")]
    pub password_login_enabled: bool,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
    /// Validity window of freshly created API tokens, in days.
    #[serde(default = "default_token_validity")]
    pub token_validity_days: i64,
    /// Root account seeded when the user table is empty.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            register_enabled: true,
            password_register_enabled: true,
            password_login_enabled: true,
            password_min_length: default_password_min(),
            token_validity_days: default_token_validity(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Root account bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_root_username")]
    pub username: String,
    #[serde(default = "default_root_password")]
    pub password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: default_root_username(),
            password: default_root_password(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_password_min() -> usize {
    8
}

fn default_token_validity() -> i64 {
    3650
}

fn default_root_username() -> String {
    "root".to_string()
}

fn default_root_password() -> String {
    "123456".to_string()
}
