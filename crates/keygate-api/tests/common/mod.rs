//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use keygate_api::{AppState, build_router, ensure_root_account};
use keygate_core::config::AppConfig;
use keygate_database::MemoryCredentialStore;

pub const ROOT_PASSWORD: &str = "123456";

/// Test application backed by the in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
}

/// A decoded response.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl TestResponse {
    pub fn success(&self) -> bool {
        self.body["success"].as_bool().unwrap_or(false)
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    /// The `name=value` pair from `Set-Cookie`.
    pub fn cookie(&self) -> String {
        self.set_cookie
            .as_deref()
            .and_then(|c| c.split(';').next())
            .unwrap_or_default()
            .to_string()
    }
}

pub fn config() -> AppConfig {
    let mut config: AppConfig = serde_json::from_value(serde_json::json!({
        "database": { "url": "postgres://localhost/keygate-test" },
        "session": { "secret": "integration-secret" },
        "rate_limit": { "critical": { "count": 100, "duration_seconds": 60 } }
    }))
    .unwrap();
    config.finalize().unwrap();
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(config, store.clone());
        ensure_root_account(&state).await.unwrap();
        Self {
            router: build_router(state.clone()),
            state,
            store,
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        credentials: &[(header::HeaderName, String)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in credentials {
            builder = builder.header(name, value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    /// Dispatch a prepared request.
    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            body,
            set_cookie,
        }
    }

    pub async fn get(&self, uri: &str, credentials: &[(header::HeaderName, String)]) -> TestResponse {
        self.send("GET", uri, None, credentials).await
    }

    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.send(
            "POST",
            "/api/user/register",
            Some(serde_json::json!({ "username": username, "password": password })),
            &[],
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(
            "POST",
            "/api/user/login",
            Some(serde_json::json!({ "username": username, "password": password })),
            &[],
        )
        .await
    }

    /// Register and log in, returning the session cookie credential.
    pub async fn session_for(&self, username: &str) -> Vec<(header::HeaderName, String)> {
        let registered = self.register(username, "password123").await;
        assert!(registered.success(), "{}", registered.body);
        let login = self.login(username, "password123").await;
        assert!(login.success(), "{}", login.body);
        vec![(header::COOKIE, login.cookie())]
    }

    pub async fn root_session(&self) -> Vec<(header::HeaderName, String)> {
        let login = self.login("root", ROOT_PASSWORD).await;
        assert!(login.success(), "{}", login.body);
        vec![(header::COOKIE, login.cookie())]
    }
}

pub fn bearer(key: &str) -> Vec<(header::HeaderName, String)> {
    vec![(header::AUTHORIZATION, format!("Bearer {key}"))]
}
