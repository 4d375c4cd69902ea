//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files and `KEYGATE__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section.

pub mod app;
pub mod auth;
pub mod database;
pub mod logging;
pub mod rate_limit;
pub mod session;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::{AuthConfig, BootstrapConfig};
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::rate_limit::{CriticalLimitConfig, RateLimitConfig, ScopeLimitConfig};
pub use self::session::SessionConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Sources are merged in order: `config/default.toml`,
/// `config/{env}.toml`, then environment variables such as
/// `KEYGATE__RATE_LIMIT__API__ENABLED=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Registration and login settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Request rate limiting settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for the given environment name.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let mut loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.finalize()?;
        Ok(loaded)
    }

    /// Fill in generated values and reject unusable settings.
    pub fn finalize(&mut self) -> Result<(), AppError> {
        if self.session.secret.is_empty() {
            tracing::warn!("session.secret is not set; sessions will not survive a restart");
            self.session.secret = uuid::Uuid::new_v4().simple().to_string();
        }

        let limits = &self.rate_limit;
        for (scope, count, duration) in [
            ("api", limits.api.count, limits.api.duration_seconds),
            ("web", limits.web.count, limits.web.duration_seconds),
            (
                "critical",
                limits.critical.count,
                limits.critical.duration_seconds,
            ),
        ] {
            if duration == 0 && count > 0 {
                return Err(AppError::configuration(format!(
                    "rate_limit.{scope}.duration_seconds must be positive"
                )));
            }
        }
        if limits.eviction_interval_seconds == 0 {
            return Err(AppError::configuration(
                "rate_limit.eviction_interval_seconds must be positive",
            ));
        }
        if self.auth.token_validity_days <= 0 {
            return Err(AppError::configuration(
                "auth.token_validity_days must be positive",
            ));
        }
        Ok(())
    }
}
