pub mod audit;
pub mod common;
pub mod health;
pub mod inventory;
pub mod items;
pub mod webhooks;

use crate::auth::AuthRouterExt;
use crate::AppState;
use axum::Router;
use std::sync::Arc;

/// Owner-scoped API under `/api/v1`; every route requires a bearer token.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(items::items_routes())
        .merge(audit::audit_routes())
        .merge(inventory::inventory_routes())
        .with_auth()
}
