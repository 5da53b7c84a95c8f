use crate::{
    auth::AuthUser,
    errors::ServiceError,
    models::{catalog::Catalog, inventory::InventorySummary},
    AppState,
};
use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

pub fn inventory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inventory/summary", get(inventory_summary))
        .route("/catalog", get(catalog))
}

/// Totals and low-stock items for the dashboard
#[utoipa::path(
    get,
    path = "/api/v1/inventory/summary",
    responses(
        (status = 200, description = "Summary returned", body = InventorySummary),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn inventory_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InventorySummary>, ServiceError> {
    Ok(Json(state.items.summary(&user.user_id).await?))
}

/// Recognised categories and units
#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    responses((status = 200, description = "Catalog returned", body = Catalog)),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn catalog() -> Json<Catalog> {
    Json(Catalog::build())
}
