//! Application builder: wires state, router, and background tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use keygate_core::config::AppConfig;
use keygate_core::error::AppError;
use keygate_core::result::AppResult;
use keygate_database::CredentialStore;
use keygate_entity::user::{NewUser, Role, User, UserStatus};

use crate::router::build_router;
use crate::state::AppState;

/// Create the root account when the user table is empty.
pub async fn ensure_root_account(state: &AppState) -> AppResult<Option<User>> {
    let bootstrap = &state.config.auth.bootstrap;
    if !bootstrap.enabled || state.store.count_users().await? > 0 {
        return Ok(None);
    }

    let password_hash = state.password_hasher.hash_password(&bootstrap.password)?;
    let root = state
        .store
        .insert_user(NewUser {
            username: bootstrap.username.clone(),
            password_hash,
            display_name: "Root User".to_string(),
            email: String::new(),
            role: Role::Root,
            status: UserStatus::Enabled,
        })
        .await?;

    tracing::warn!(
        username = %root.username,
        "No users existed; created the root account with the configured bootstrap password. Change it now"
    );
    Ok(Some(root))
}

/// Runs the Keygate HTTP server until Ctrl+C or SIGTERM.
pub async fn run_server(config: AppConfig, store: Arc<dyn CredentialStore>) -> AppResult<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let state = AppState::new(config, store);
    ensure_root_account(&state).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let eviction = Arc::clone(&state.limiter).spawn_eviction(shutdown_rx);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Keygate server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    })
    .await
    .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if tokio::time::timeout(grace, eviction).await.is_err() {
        tracing::warn!("Rate limiter eviction task did not stop in time");
    }

    tracing::info!("Keygate server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use keygate_database::MemoryCredentialStore;

    use super::*;

    fn config() -> AppConfig {
        let mut config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://localhost/keygate" }
        }))
        .unwrap();
        config.finalize().unwrap();
        config
    }

    #[tokio::test]
    async fn root_is_created_once() {
        let state = AppState::new(config(), Arc::new(MemoryCredentialStore::new()));

        let root = ensure_root_account(&state).await.unwrap().unwrap();
        assert_eq!(root.role, Role::Root);
        assert_eq!(root.username, "root");
        assert!(ensure_root_account(&state).await.unwrap().is_none());
        assert_eq!(state.store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bootstrap_can_be_disabled() {
        let mut config = config();
        config.auth.bootstrap.enabled = false;
        let state = AppState::new(config, Arc::new(MemoryCredentialStore::new()));
        assert!(ensure_root_account(&state).await.unwrap().is_none());
    }
}
