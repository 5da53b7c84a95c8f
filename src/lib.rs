//! Pizza Pantry
//!
//! Multi-tenant inventory tracking for pizza kitchens: items, audited quantity
//! adjustments and identity-provider webhooks over an HTTP JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{http::HeaderValue, routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    middleware_helpers::ReplayGuard,
    services::{
        audit::AuditService, identity::IdentityService, items::ItemService,
        ledger::QuantityLedger,
    },
    webhooks::WebhookVerifier,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub ledger: QuantityLedger,
    pub items: ItemService,
    pub audit: AuditService,
    pub identity: IdentityService,
    pub auth: Arc<AuthService>,
    /// `None` when no webhook secret is configured; deliveries are then refused.
    pub webhook_verifier: Option<WebhookVerifier>,
    pub replay_guard: ReplayGuard,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> Result<Self, ServiceError> {
        let webhook_verifier = match config.clerk_webhook_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Some(
                WebhookVerifier::new(secret, config.webhook_tolerance())
                    .map_err(|e| ServiceError::InternalError(e.to_string()))?,
            ),
            _ => {
                ::tracing::warn!(
                    "No identity webhook secret configured; webhook deliveries will be refused"
                );
                None
            }
        };

        Ok(Self {
            ledger: QuantityLedger::new(db.clone(), config.ledger_max_retries),
            items: ItemService::new(db.clone(), config.ledger_max_retries),
            audit: AuditService::new(
                db.clone(),
                config.api_default_page_size,
                config.api_max_page_size,
            ),
            identity: IdentityService::new(db.clone()),
            auth: Arc::new(AuthService::new(AuthConfig::from(&config))),
            webhook_verifier,
            replay_guard: ReplayGuard::default(),
            config: Arc::new(config),
            db,
        })
    }
}

/// CORS policy derived from configuration: explicit origins win, then the
/// permissive fallback, otherwise cross-origin requests are not allowed.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// The complete HTTP application.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/", get(|| async { "pizza-pantry up" }))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", handlers::api_v1_routes())
        .nest("/api/webhooks", handlers::webhooks::webhook_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(Extension(state.auth.clone()))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
