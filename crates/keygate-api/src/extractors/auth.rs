//! Identity extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use keygate_auth::Principal;
use keygate_core::error::{AppError, ErrorKind};
use keygate_entity::token::Token;

use crate::error::ApiError;
use crate::middleware::auth::{authorization, session_cookie, unauthenticated};
use crate::state::AppState;

/// The caller admitted by one of the auth layers.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl std::ops::Deref for AuthPrincipal {
    type Target = Principal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(unauthenticated)
    }
}

/// The API token admitted by `token_auth`.
#[derive(Debug, Clone)]
pub struct ApiToken(pub Token);

impl<S: Send + Sync> FromRequestParts<S> for ApiToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Token>()
            .cloned()
            .map(ApiToken)
            .ok_or_else(|| ApiError(AppError::new(ErrorKind::TokenNotFound, "no API token supplied")))
    }
}

/// Optional identity. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(Some(principal.clone())));
        }
        let session = session_cookie(state, &parts.headers);
        let header = authorization(&parts.headers);
        let principal = state
            .identity
            .resolve_optional(session.as_deref(), header.as_deref())
            .await;
        Ok(Self(principal))
    }
}
