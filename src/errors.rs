use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Insufficient quantity",
    "details": "current quantity 5, requested change -6",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Item not found")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier, echoed from `x-request-id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[schema(example = "2024-12-09T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The adjustment would drive an item's quantity below zero.
    #[error("Insufficient quantity for item {item_id}: have {available}, change {change}")]
    InsufficientQuantity {
        item_id: Uuid,
        available: Decimal,
        change: Decimal,
    },

    /// The compare-and-set on an item's quantity kept losing to other writers.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Webhook error: {0}")]
    WebhookError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(crate::models::first_validation_message(&err))
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(e) => ServiceError::db_error(e),
            TransactionError::Transaction(e) => e,
        }
    }
}

impl ServiceError {
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    pub fn item_not_found() -> Self {
        ServiceError::NotFound("Item not found".to_string())
    }

    /// Lost a race with another writer; the whole transaction may be retried.
    pub fn is_contention(&self) -> bool {
        match self {
            Self::ConcurrentModification(_) => true,
            Self::DatabaseError(e) => crate::db::is_contention(e),
            _ => false,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::WebhookError(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) | Self::ConcurrentModification(_) => StatusCode::CONFLICT,
            Self::InsufficientQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::InsufficientQuantity { .. } => "Insufficient quantity".to_string(),
            Self::ConcurrentModification(_) => {
                "Item was modified concurrently, please retry".to_string()
            }
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::InvalidInput(msg)
            | Self::Unauthorized(msg)
            | Self::Conflict(msg)
            | Self::WebhookError(msg) => msg.clone(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::InsufficientQuantity {
                available, change, ..
            } => Some(format!(
                "current quantity {}, requested change {}",
                available, change
            )),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
