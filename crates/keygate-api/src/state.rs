//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use keygate_auth::{
    IdentityResolver, PasswordHasher, PasswordValidator, RateLimiterRegistry, SessionCodec,
    TokenLifecycleEvaluator,
};
use keygate_core::config::AppConfig;
use keygate_database::CredentialStore;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Persistence ──────────────────────────────────────────
    /// User and API token store
    pub store: Arc<dyn CredentialStore>,

    // ── Gate ─────────────────────────────────────────────────
    /// Session cookie encoder and validator
    pub sessions: Arc<SessionCodec>,
    /// Session / access-token identity resolution
    pub identity: IdentityResolver,
    /// API token validation and quota charging
    pub tokens: TokenLifecycleEvaluator,
    /// Per-scope request rate limiters
    pub limiter: Arc<RateLimiterRegistry>,

    // ── Passwords ────────────────────────────────────────────
    /// Password hasher (Argon2)
    pub password_hasher: Arc<PasswordHasher>,
    /// Password policy
    pub password_validator: Arc<PasswordValidator>,
}

impl AppState {
    /// Wire the gate components around a store.
    pub fn new(config: AppConfig, store: Arc<dyn CredentialStore>) -> Self {
        let sessions = Arc::new(SessionCodec::new(&config.session));
        let tokens = TokenLifecycleEvaluator::new(Arc::clone(&store));
        let identity =
            IdentityResolver::new(Arc::clone(&store), Arc::clone(&sessions), tokens.clone());
        let limiter = Arc::new(RateLimiterRegistry::new(&config.rate_limit));
        let password_validator = Arc::new(PasswordValidator::new(&config.auth));

        Self {
            config: Arc::new(config),
            store,
            sessions,
            identity,
            tokens,
            limiter,
            password_hasher: Arc::new(PasswordHasher::new()),
            password_validator,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}
