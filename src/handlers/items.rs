use super::common::{
    created_response, json_body, parse_item_id, query_params, success_response, SuccessResponse,
};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    models::{
        inventory::{ItemView, SortKey},
        AdjustQuantityInput, CreateItemInput, UpdateItemInput,
    },
    services::items::ItemFilter,
    AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
/// Set to `true` on an adjustment response that replayed an earlier key.
pub const IDEMPOTENT_REPLAY_HEADER: &str = "idempotent-replayed";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListItemsParams {
    /// Case-insensitive substring of the item name
    pub search: Option<String>,
    /// A category, or `all`
    pub category: Option<String>,
    pub sort: Option<SortKey>,
}

pub fn items_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/:id/quantity", patch(adjust_quantity))
}

/// List the caller's items, newest first
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ListItemsParams),
    responses(
        (status = 200, description = "Items returned", body = [ItemView]),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    params: Result<Query<ListItemsParams>, QueryRejection>,
) -> Result<Json<Vec<ItemView>>, ServiceError> {
    let params = query_params(params)?;
    let filter = ItemFilter {
        search: params.search,
        category: params.category,
        sort: params.sort,
    };
    let items = state.items.list(&user.user_id, &filter).await?;
    Ok(Json(items))
}

/// Create an item
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemInput,
    responses(
        (status = 201, description = "Item created", body = ItemView),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateItemInput>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let new_item = json_body(payload)?.into_new_item()?;
    let item = state.items.create(&user.user_id, new_item).await?;
    Ok(created_response(item))
}

/// Fetch one item
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item returned", body = ItemView),
        (status = 400, description = "Invalid item ID", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ItemView>, ServiceError> {
    let item_id = parse_item_id(&id)?;
    Ok(Json(state.items.get(&user.user_id, item_id).await?))
}

/// Update some or all fields of an item
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    request_body = UpdateItemInput,
    responses(
        (status = 200, description = "Item updated", body = ItemView),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name or concurrent edit", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemInput>, JsonRejection>,
) -> Result<Json<ItemView>, ServiceError> {
    let item_id = parse_item_id(&id)?;
    let changes = json_body(payload)?.into_changes()?;
    let item = state.items.update(&user.user_id, item_id, changes).await?;
    Ok(Json(item))
}

/// Delete an item and its audit trail
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted", body = SuccessResponse),
        (status = 400, description = "Invalid item ID", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let item_id = parse_item_id(&id)?;
    state.items.delete(&user.user_id, item_id).await?;
    Ok(success_response(SuccessResponse { success: true }))
}

/// Add to or take from an item's quantity
///
/// Sending the same `Idempotency-Key` again returns the item without applying
/// the change twice, flagged with `Idempotent-Replayed: true`.
#[utoipa::path(
    patch,
    path = "/api/v1/items/{id}/quantity",
    params(
        ("id" = String, Path, description = "Item id"),
        ("Idempotency-Key" = Option<String>, Header, description = "Deduplicates retried adjustments")
    ),
    request_body = AdjustQuantityInput,
    responses(
        (
            status = 200, description = "Quantity adjusted", body = ItemView,
            headers(("Idempotent-Replayed" = bool, description = "Earlier adjustment replayed"))
        ),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient quantity", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "items"
)]
pub async fn adjust_quantity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<AdjustQuantityInput>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let item_id = parse_item_id(&id)?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let adjustment = json_body(payload)?
        .into_adjustment(&state.config.default_adjust_reason, idempotency_key)?;

    let receipt = state
        .ledger
        .adjust_quantity(item_id, &user.user_id, adjustment)
        .await?;

    let replayed = HeaderValue::from_static(if receipt.replayed { "true" } else { "false" });
    Ok(([(IDEMPOTENT_REPLAY_HEADER, replayed)], Json(receipt.item)).into_response())
}
