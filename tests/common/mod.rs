#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use pizza_pantry::{
    auth::AuthService, build_router, config::AppConfig, db, webhooks::WebhookVerifier, AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const OWNER_A: &str = "user_a";
pub const OWNER_B: &str = "user_b";

// base64("pizza-pantry-test-signing-key")
pub const WEBHOOK_SECRET: &str = "whsec_cGl6emEtcGFudHJ5LXRlc3Qtc2lnbmluZy1rZXk=";

const TEST_JWT_SECRET: &str = "k3J9xq2LmP8vR4tY7wZ1aB6cD0eF5gH-iJ_uK9lM2nO4pQ7rS1tU3vW6xY8zA0bC";

/// Application wired to a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth: std::sync::Arc<AuthService>,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller tweak the configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("pantry.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.clerk_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(std::sync::Arc::new(pool), cfg).expect("build app state");
        let auth = state.auth.clone();
        let router = build_router(state.clone());

        Self {
            router,
            state,
            auth,
            _dir: dir,
        }
    }

    pub fn token_for(&self, owner: &str) -> String {
        self.auth
            .issue_token(owner, Duration::from_secs(3600))
            .expect("issue test token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Authenticated request as `owner`.
    pub async fn as_owner(
        &self,
        owner: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let token = self.token_for(owner);
        self.request(method, uri, body, Some(&token), &[]).await
    }

    /// Creates an item and returns its id.
    pub async fn create_item(&self, owner: &str, name: &str, quantity: i64) -> String {
        let res = self
            .as_owner(
                owner,
                Method::POST,
                "/api/v1/items",
                Some(json!({
                    "name": name,
                    "category": "dough",
                    "unit": "kg",
                    "quantity": quantity,
                    "reorderThreshold": 5,
                    "costPrice": 1.25
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create failed: {}", res.body);
        res.body["id"].as_str().expect("item id").to_string()
    }

    pub async fn adjust(
        &self,
        owner: &str,
        item_id: &str,
        change: i64,
        reason: Option<&str>,
    ) -> TestResponse {
        let mut body = json!({ "change": change });
        if let Some(reason) = reason {
            body["reason"] = json!(reason);
        }
        self.as_owner(
            owner,
            Method::PATCH,
            &format!("/api/v1/items/{}/quantity", item_id),
            Some(body),
        )
        .await
    }

    /// Newest audit entry for `item_id`, as returned by the audit API.
    pub async fn latest_audit(&self, owner: &str, item_id: &str) -> Value {
        let res = self
            .as_owner(
                owner,
                Method::GET,
                &format!("/api/v1/audit?itemId={}&limit=1", item_id),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "audit failed: {}", res.body);
        res.body["auditLogs"][0].clone()
    }

    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(WEBHOOK_SECRET, Duration::from_secs(300)).expect("test secret")
    }
}

/// Reads a decimal field that may be serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}
