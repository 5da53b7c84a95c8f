use super::common::{parse_item_id, query_params};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::audit::AuditPage,
    AppState,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditParams {
    /// Only entries for this item
    pub item_id: Option<String>,
    /// 1-based page number
    pub page: Option<i64>,
    /// Page size, capped at the configured maximum
    pub limit: Option<i64>,
}

pub fn audit_routes() -> Router<Arc<AppState>> {
    Router::new().route("/audit", get(list_audit))
}

/// Quantity change history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    params(AuditParams),
    responses(
        (status = 200, description = "Audit page returned", body = AuditPage),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "audit"
)]
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    params: Result<Query<AuditParams>, QueryRejection>,
) -> Result<Json<AuditPage>, ServiceError> {
    let params = query_params(params)?;

    let item_id = params
        .item_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(parse_item_id)
        .transpose()?;
    let page = positive(params.page, "Invalid page")?;
    let limit = positive(params.limit, "Invalid limit")?;

    let page = state
        .audit
        .list(&user.user_id, item_id, page, limit)
        .await?;
    Ok(Json(page))
}

fn positive(value: Option<i64>, message: &str) -> Result<Option<u64>, ServiceError> {
    match value {
        Some(v) if v < 1 => Err(ServiceError::InvalidInput(message.to_string())),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}
