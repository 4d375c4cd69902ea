//! Admin user management handlers.
//!
//! An admin may only act on users ranked strictly below them, and may only
//! grant roles strictly below their own.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};

use keygate_auth::rbac::{can_assign, can_manage};
use keygate_core::error::AppError;
use keygate_core::types::response::Envelope;
use keygate_entity::user::{NewUser, User, UserChanges, UserStatus};

use crate::dto::request::{CreateUserRequest, UpdateUserRequest};
use crate::error::ApiResult;
use crate::extractors::{AuthPrincipal, PaginationParams, parse_uuid};
use crate::handlers::{non_empty, pagination, validated};
use crate::state::AppState;

async fn load_user(state: &AppState, raw_id: &str) -> ApiResult<User> {
    let id = parse_uuid(raw_id, "user")?;
    state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found").into())
}

/// GET /api/user/
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<User>>>> {
    let params = pagination(query)?;
    let page = state.store.page_users(&params.page_request()).await?;
    Ok(Json(Envelope::page(page.items, page.total)))
}

/// GET /api/user/search?keyword=
pub async fn search_users(
    State(state): State<AppState>,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<User>>>> {
    let params = pagination(query)?;
    let page = state
        .store
        .search_users(params.keyword.trim(), &params.page_request())
        .await?;
    Ok(Json(Envelope::page(page.items, page.total)))
}

/// GET /api/user/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<User>>> {
    let user = load_user(&state, &id).await?;
    Ok(Json(Envelope::ok(user)))
}

/// POST /api/user/
pub async fn create_user(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<User>>> {
    let req = validated(payload)?;
    let username = req.username.trim().to_string();
    state.password_validator.validate(&req.password)?;

    if !can_assign(actor.role, req.role) {
        return Err(AppError::insufficient_role(
            "cannot create a user with a role at or above your own",
        )
        .into());
    }
    if state.store.username_exists(&username).await? {
        return Err(AppError::conflict("username already exists").into());
    }

    let display_name = non_empty(Some(req.display_name)).unwrap_or_else(|| username.clone());
    let password_hash = state.password_hasher.hash_password(&req.password)?;
    let user = state
        .store
        .insert_user(NewUser {
            username,
            password_hash,
            display_name,
            email: req.email.trim().to_string(),
            role: req.role,
            status: req.status.unwrap_or(UserStatus::Enabled),
        })
        .await?;

    tracing::info!(actor = %actor.id, user_id = %user.id, role = %user.role, "User created");
    Ok(Json(Envelope::ok(user).with_message("created")))
}

/// PUT /api/user/
pub async fn update_user(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<User>>> {
    let req = validated(payload)?;
    let target = load_user(&state, &req.id).await?;

    if !can_manage(actor.role, target.role) {
        return Err(AppError::insufficient_role(
            "cannot modify a user with a role at or above your own",
        )
        .into());
    }
    if let Some(role) = req.role {
        if !can_assign(actor.role, role) {
            return Err(AppError::insufficient_role(
                "cannot grant a role at or above your own",
            )
            .into());
        }
    }

    let password_hash = match non_empty(req.password) {
        Some(password) => {
            state.password_validator.validate(&password)?;
            Some(state.password_hasher.hash_password(&password)?)
        }
        None => None,
    };

    let changes = UserChanges {
        username: non_empty(req.username),
        password_hash,
        display_name: non_empty(req.display_name),
        email: req.email.map(|e| e.trim().to_string()),
        role: req.role,
        status: req.status,
        access_token: None,
    };
    if changes.is_empty() {
        return Ok(Json(Envelope::ok(target)));
    }

    let user = state.store.update_user(target.id, &changes).await?;
    tracing::info!(actor = %actor.id, user_id = %user.id, "User updated");
    Ok(Json(Envelope::ok(user).with_message("updated")))
}

/// DELETE /api/user/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<()>>> {
    let target = load_user(&state, &id).await?;
    if !can_manage(actor.role, target.role) {
        return Err(AppError::insufficient_role(
            "cannot delete a user with a role at or above your own",
        )
        .into());
    }

    if !state.store.delete_user(target.id).await? {
        return Err(AppError::not_found("user not found").into());
    }
    tracing::info!(actor = %actor.id, user_id = %target.id, "User deleted");
    Ok(Json(Envelope::done().with_message("deleted")))
}
