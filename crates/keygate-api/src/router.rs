//! Route definitions for the Keygate HTTP API.
//!
//! Every `/api` route passes the API rate limiter first, then the route's
//! own gate: the critical limiter, a role floor, or API token auth.

use axum::handler::Handler;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let api_routes = Router::new()
        .merge(public_user_routes(&state))
        .merge(self_routes(&state))
        .merge(admin_routes(&state))
        .merge(token_routes(&state))
        .merge(usage_routes(&state))
        .route("/status", get(handlers::status::status))
        .route("/health", get(handlers::health::health))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::api_rate_limit,
        ));

    let fallback = handlers::status::fallback.layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::rate_limit::web_rate_limit,
    ));

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.server.cors))
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Registration, login, logout
fn public_user_routes(state: &AppState) -> Router<AppState> {
    let critical = || {
        axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::critical_rate_limit,
        )
    };

    Router::new()
        .route(
            "/user/register",
            post(handlers::user::register).layer(critical()),
        )
        .route("/user/login", post(handlers::user::login).layer(critical()))
        .route("/user/logout", get(handlers::user::logout))
}

/// Self-service, role ≥ Common
fn self_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/user/self",
            get(handlers::user::get_self)
                .put(handlers::user::update_self)
                .delete(handlers::user::delete_self),
        )
        .route("/user/token", get(handlers::user::generate_access_token))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::user_auth,
        ))
}

/// User management, role ≥ Admin
fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/user/",
            get(handlers::admin::list_users)
                .post(handlers::admin::create_user)
                .put(handlers::admin::update_user),
        )
        .route("/user/search", get(handlers::admin::search_users))
        .route(
            "/user/{id}",
            get(handlers::admin::get_user).delete(handlers::admin::delete_user),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ))
}

/// API token management, role ≥ Common
fn token_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/token/",
            get(handlers::token::list_tokens)
                .post(handlers::token::create_token)
                .put(handlers::token::update_token),
        )
        .route("/token/search", get(handlers::token::search_tokens))
        .route(
            "/token/{id}",
            get(handlers::token::get_token).delete(handlers::token::delete_token),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::user_auth,
        ))
}

/// Quota charging, API token auth
fn usage_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/usage", post(handlers::usage::charge))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::token_auth,
        ))
}
