//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::error;

use keygate_core::types::response::Envelope;

use crate::dto::response::HealthResponse;
use crate::state::AppState;

/// GET /api/health
///
/// Answers 503 when the credential store cannot be reached.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Envelope<HealthResponse>>) {
    let version = env!("CARGO_PKG_VERSION").to_string();
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Envelope::ok(HealthResponse {
                status: "ok".to_string(),
                version,
            })),
        ),
        Err(e) => {
            error!(error = %e, "Credential store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Envelope {
                    success: false,
                    message: "credential store unavailable".to_string(),
                    data: Some(HealthResponse {
                        status: "unavailable".to_string(),
                        version,
                    }),
                    total: None,
                }),
            )
        }
    }
}
