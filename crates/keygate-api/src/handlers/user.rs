//! Registration, login, and self-service handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};

use keygate_core::error::AppError;
use keygate_core::types::response::Envelope;
use keygate_entity::token::generate_key;
use keygate_entity::user::{NewUser, Role, User, UserChanges, UserStatus};

use crate::dto::request::{LoginRequest, RegisterRequest, UpdateSelfRequest};
use crate::error::{ApiResult, invalid_body};
use crate::extractors::AuthPrincipal;
use crate::handlers::{non_empty, validated};
use crate::state::AppState;

const LOGIN_REFUSED: &str = "username or password is incorrect, or the account is disabled";

/// `Set-Cookie` for a fresh session.
fn session_cookie(state: &AppState, value: &str) -> ApiResult<HeaderMap> {
    let session = &state.config.session;
    let max_age = state.sessions.max_age().num_seconds();
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}",
        session.cookie_name
    );
    if session.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie_header(&cookie)
}

/// `Set-Cookie` that drops the session.
fn cleared_cookie(state: &AppState) -> ApiResult<HeaderMap> {
    let session = &state.config.session;
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        session.cookie_name
    );
    if session.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie_header(&cookie)
}

fn cookie_header(cookie: &str) -> ApiResult<HeaderMap> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::internal(format!("Invalid session cookie: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

async fn load_self(state: &AppState, principal: &AuthPrincipal) -> ApiResult<User> {
    state
        .store
        .find_user_by_id(principal.id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found").into())
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<()>>> {
    let auth = &state.config.auth;
    if !auth.register_enabled {
        return Err(AppError::validation("registration is disabled by the administrator").into());
    }
    if !auth.password_register_enabled {
        return Err(AppError::validation(
            "password registration is disabled by the administrator",
        )
        .into());
    }

    let req = validated(payload)?;
    let username = req.username.trim().to_string();
    state.password_validator.validate(&req.password)?;

    if state.store.username_exists(&username).await? {
        return Err(AppError::conflict("username already exists").into());
    }

    let password_hash = state.password_hasher.hash_password(&req.password)?;
    let user = state
        .store
        .insert_user(NewUser {
            display_name: username.clone(),
            username,
            password_hash,
            email: req.email.trim().to_string(),
            role: Role::Common,
            status: UserStatus::Enabled,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(Json(Envelope::done().with_message("registered")))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<Envelope<User>>)> {
    if !state.config.auth.password_login_enabled {
        return Err(AppError::validation("password login is disabled by the administrator").into());
    }

    let Json(req) = payload.map_err(invalid_body)?;
    let identifier = req.username.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("invalid parameters").into());
    }

    let Some(user) = state.store.find_user_by_login(identifier).await? else {
        tracing::debug!(identifier, "Login for unknown user");
        return Err(AppError::invalid_credential(LOGIN_REFUSED).into());
    };
    let password_ok = state
        .password_hasher
        .verify_password(&req.password, &user.password_hash)?;
    if !password_ok || !user.is_enabled() {
        tracing::debug!(user_id = %user.id, "Login refused");
        return Err(AppError::invalid_credential(LOGIN_REFUSED).into());
    }

    let session = state.sessions.issue(&user)?;
    let headers = session_cookie(&state, &session)?;

    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");
    Ok((headers, Json(Envelope::ok(user).with_message("logged in"))))
}

/// GET /api/user/logout
pub async fn logout(State(state): State<AppState>) -> ApiResult<(HeaderMap, Json<Envelope<()>>)> {
    let headers = cleared_cookie(&state)?;
    Ok((headers, Json(Envelope::done().with_message("logged out"))))
}

/// GET /api/user/self
pub async fn get_self(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> ApiResult<Json<Envelope<User>>> {
    let user = load_self(&state, &principal).await?;
    Ok(Json(Envelope::ok(user)))
}

/// PUT /api/user/self
///
/// Role and status are not self-service.
pub async fn update_self(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    payload: Result<Json<UpdateSelfRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<User>>> {
    let req = validated(payload)?;

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
        ..UserChanges::default()
    };

    if changes.is_empty() {
        let user = load_self(&state, &principal).await?;
        return Ok(Json(Envelope::ok(user)));
    }

    let user = state.store.update_user(principal.id, &changes).await?;
    Ok(Json(Envelope::ok(user).with_message("updated")))
}

/// DELETE /api/user/self
pub async fn delete_self(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> ApiResult<(HeaderMap, Json<Envelope<()>>)> {
    if !state.store.delete_user(principal.id).await? {
        return Err(AppError::not_found("user not found").into());
    }
    tracing::info!(user_id = %principal.id, "User deleted their account");

    let headers = cleared_cookie(&state)?;
    Ok((headers, Json(Envelope::done().with_message("deleted"))))
}

/// GET /api/user/token
///
/// Rotates the caller's personal access token and returns the new value.
pub async fn generate_access_token(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> ApiResult<Json<Envelope<String>>> {
    let token = generate_key();
    let changes = UserChanges {
        access_token: Some(token.clone()),
        ..UserChanges::default()
    };
    state.store.update_user(principal.id, &changes).await?;

    tracing::info!(user_id = %principal.id, "Access token rotated");
    Ok(Json(Envelope::ok(token).with_message("generated")))
}
