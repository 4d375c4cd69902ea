//! Public status and fallback handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, Uri};

use keygate_core::types::response::Envelope;

use crate::dto::response::{CallerResponse, StatusResponse};
use crate::extractors::MaybePrincipal;
use crate::state::AppState;

/// GET /api/status
pub async fn status(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Json<Envelope<StatusResponse>> {
    let auth = &state.config.auth;
    let user = principal.map(|p| CallerResponse {
        id: p.id,
        username: p.username,
        role: p.role,
        status: p.status,
        origin: p.origin,
    });

    Json(Envelope::ok(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        register_enabled: auth.register_enabled,
        password_register_enabled: auth.password_register_enabled,
        password_login_enabled: auth.password_login_enabled,
        user,
    }))
}

/// Unmatched routes.
pub async fn fallback(uri: Uri) -> (StatusCode, Json<Envelope<()>>) {
    let message = if uri.path().starts_with("/api") {
        "API route not found"
    } else {
        "not found"
    };
    (StatusCode::NOT_FOUND, Json(Envelope::failure(message)))
}
