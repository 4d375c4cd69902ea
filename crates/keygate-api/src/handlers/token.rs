//! API token management handlers.
//!
//! Tokens are visible to their owner and to admins. Only admins grant quota.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};

use keygate_auth::Principal;
use keygate_core::error::AppError;
use keygate_core::types::response::Envelope;
use keygate_entity::token::{NewToken, Token, TokenChanges};

use crate::dto::request::{CreateTokenRequest, UpdateTokenRequest};
use crate::error::ApiResult;
use crate::extractors::{AuthPrincipal, PaginationParams, parse_uuid};
use crate::handlers::{non_empty, pagination, validated};
use crate::state::AppState;

/// Load a live token the caller may act on.
async fn load_owned(state: &AppState, actor: &Principal, raw_id: &str) -> ApiResult<Token> {
    let id = parse_uuid(raw_id, "token")?;
    let token = state
        .store
        .find_token_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("token not found"))?;

    if token.user_id != actor.id && !actor.is_admin() {
        tracing::debug!(user_id = %actor.id, token_id = %token.id, "Token access refused");
        return Err(AppError::insufficient_role("no permission for this token").into());
    }
    Ok(token)
}

/// Quota fields are admin only, even on the caller's own tokens.
fn ensure_may_grant(
    actor: &Principal,
    remaining_quota: Option<i64>,
    unlimited_quota: Option<bool>,
) -> ApiResult<()> {
    if (remaining_quota.is_some() || unlimited_quota.is_some()) && !actor.is_admin() {
        tracing::debug!(user_id = %actor.id, "Quota grant refused");
        return Err(AppError::insufficient_role("only admins can set token quota").into());
    }
    Ok(())
}

/// GET /api/token/
pub async fn list_tokens(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<Token>>>> {
    let params = pagination(query)?;
    let page = state
        .store
        .page_tokens(Some(actor.id), None, &params.page_request())
        .await?;
    Ok(Json(Envelope::page(page.items, page.total)))
}

/// GET /api/token/search?keyword=
pub async fn search_tokens(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<Token>>>> {
    let params = pagination(query)?;
    let keyword = params.keyword.trim();
    let keyword = (!keyword.is_empty()).then_some(keyword);
    let page = state
        .store
        .page_tokens(Some(actor.id), keyword, &params.page_request())
        .await?;
    Ok(Json(Envelope::page(page.items, page.total)))
}

/// GET /api/token/{id}
pub async fn get_token(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Token>>> {
    let token = load_owned(&state, &actor, &id).await?;
    Ok(Json(Envelope::ok(token)))
}

/// POST /api/token/
pub async fn create_token(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Token>>> {
    let req = validated(payload)?;
    ensure_may_grant(&actor, req.remaining_quota, req.unlimited_quota)?;

    let mut new_token = NewToken::issue(
        actor.id,
        req.name.trim(),
        state.config.auth.token_validity_days,
        req.remaining_quota.unwrap_or(0),
        req.unlimited_quota.unwrap_or(false),
    );
    if let Some(expires_at) = req.expires_at {
        new_token.expires_at = expires_at;
    }

    let token = state.store.insert_token(new_token).await?;
    tracing::info!(user_id = %actor.id, token_id = %token.id, "API token created");
    Ok(Json(Envelope::ok(token).with_message("created")))
}

/// PUT /api/token/
pub async fn update_token(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    payload: Result<Json<UpdateTokenRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Token>>> {
    let req = validated(payload)?;
    let existing = load_owned(&state, &actor, &req.id).await?;
    ensure_may_grant(&actor, req.remaining_quota, req.unlimited_quota)?;

    let changes = TokenChanges {
        name: non_empty(req.name),
        status: req.status,
        expires_at: req.expires_at,
        remaining_quota: req.remaining_quota,
        unlimited_quota: req.unlimited_quota,
    };
    let token = state.store.update_token(existing.id, &changes).await?;

    tracing::info!(user_id = %actor.id, token_id = %token.id, status = %token.status, "API token updated");
    Ok(Json(Envelope::ok(token).with_message("updated")))
}

/// DELETE /api/token/{id}
pub async fn delete_token(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<()>>> {
    let token = load_owned(&state, &actor, &id).await?;
    if !state.store.delete_token(token.id).await? {
        return Err(AppError::not_found("token not found").into());
    }
    tracing::info!(user_id = %actor.id, token_id = %token.id, "API token deleted");
    Ok(Json(Envelope::done().with_message("deleted")))
}
