use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LivenessResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatabaseCheck {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: DatabaseCheck,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = LivenessResponse)),
    tag = "health"
)]
pub async fn liveness_check() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: ComponentStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
    })
}

/// Readiness probe; pings the database
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready for traffic", body = ReadinessResponse),
        (status = 503, description = "Database unreachable", body = ReadinessResponse)
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let start = Instant::now();
    let result = crate::db::check_connection(&state.db).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                database: DatabaseCheck {
                    status: ComponentStatus::Up,
                    latency_ms: Some(latency_ms),
                    error: None,
                },
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    database: DatabaseCheck {
                        status: ComponentStatus::Down,
                        latency_ms: None,
                        error: Some("database unreachable".to_string()),
                    },
                }),
            )
        }
    }
}

/// Endpoints:
/// - GET /health       - liveness
/// - GET /health/ready - readiness (database ping)
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check))
}
