use crate::errors::ServiceError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Body of a successful delete.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Unwraps a JSON body, turning axum's rejection into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))
}

/// Same as [`json_body`] for query strings.
pub fn query_params<T>(
    params: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, ServiceError> {
    params
        .map(|axum::extract::Query(p)| p)
        .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))
}

pub fn parse_item_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::InvalidInput("Invalid item ID".to_string()))
}
