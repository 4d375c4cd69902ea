//! Authentication and role-floor middleware.
//!
//! Each layer resolves the caller, runs the authorization gate, and on
//! success stores the [`Principal`] in the request extensions for the
//! `AuthPrincipal` extractor.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use keygate_auth::{Principal, authorize};
use keygate_core::error::AppError;
use keygate_entity::user::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// The raw session cookie value, if any.
pub fn session_cookie(state: &AppState, headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(&state.config.session.cookie_name)
        .map(|cookie| cookie.value().to_string())
}

/// The raw `Authorization` header value, if any.
pub fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn auth_helper(state: AppState, required: Role, mut request: Request, next: Next) -> Response {
    let session = session_cookie(&state, request.headers());
    let header = authorization(request.headers());

    let principal = match state
        .identity
        .resolve(session.as_deref(), header.as_deref())
        .await
    {
        Ok(principal) => principal,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if let Err(e) = authorize(&principal, required).into_result() {
        tracing::debug!(
            user_id = %principal.id,
            role = %principal.role,
            required = %required,
            reason = %e.kind,
            "Authorization refused"
        );
        return ApiError(e).into_response();
    }

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Requires role ≥ Common.
pub async fn user_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    auth_helper(state, Role::Common, request, next).await
}

/// Requires role ≥ Admin.
pub async fn admin_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    auth_helper(state, Role::Admin, request, next).await
}

/// Authenticates a quota-bearing API token from the `Authorization` header.
///
/// Stores both the owner's [`Principal`] and the validated token.
pub async fn token_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = authorization(request.headers());

    let (principal, token) = match state.identity.resolve_api_token(header.as_deref()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            if e.kind.is_token_rejection() {
                tracing::debug!(reason = %e.kind, "API token refused");
            } else if !e.kind.is_internal() {
                tracing::warn!(reason = %e.kind, message = %e.message, "API token owner refused");
            }
            return ApiError(e).into_response();
        }
    };

    request.extensions_mut().insert::<Principal>(principal);
    request.extensions_mut().insert(token);
    next.run(request).await
}

/// Rejects with the stock unauthenticated envelope.
pub fn unauthenticated() -> ApiError {
    ApiError(AppError::unauthenticated(
        "not logged in and no access token supplied",
    ))
}
