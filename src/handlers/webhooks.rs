use crate::{
    errors::ServiceError,
    services::identity::WebhookEvent,
    webhooks::{SignatureError, SvixHeaders},
    AppState,
};
use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookStatus {
    pub message: String,
}

pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route("/clerk", get(clerk_webhook_status).post(clerk_webhook))
}

/// Liveness of the identity webhook endpoint
#[utoipa::path(
    get,
    path = "/api/webhooks/clerk",
    responses((status = 200, description = "Endpoint active", body = WebhookStatus)),
    tag = "webhooks"
)]
pub async fn clerk_webhook_status() -> Json<WebhookStatus> {
    Json(WebhookStatus {
        message: "Clerk webhook endpoint is active".to_string(),
    })
}

/// Receive a signed identity-provider event
///
/// Once the signature checks out the delivery is acknowledged, even if
/// applying the event fails; failures are logged.
#[utoipa::path(
    post,
    path = "/api/webhooks/clerk",
    request_body(content = String, description = "Raw event JSON", content_type = "application/json"),
    params(
        ("svix-id" = String, Header, description = "Delivery id"),
        ("svix-timestamp" = String, Header, description = "Unix seconds"),
        ("svix-signature" = String, Header, description = "Space separated v1 signatures")
    ),
    responses(
        (status = 200, description = "Delivery accepted", body = WebhookAck),
        (status = 400, description = "Missing headers or invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Webhook secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn clerk_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let svix = SvixHeaders::from_headers(&headers)
        .map_err(|e| ServiceError::WebhookError(e.to_string()))?;

    let verifier = state.webhook_verifier.as_ref().ok_or_else(|| {
        ServiceError::InternalError("Identity webhook secret is not configured".to_string())
    })?;

    verifier.verify(&svix, &body).map_err(|e| {
        warn!(svix_id = svix.id, reason = %e, "Rejected webhook delivery");
        ServiceError::WebhookError(SignatureError::NoMatchingSignature.to_string())
    })?;

    let ack = Json(WebhookAck { received: true });

    if !state.replay_guard.first_delivery(svix.id) {
        info!(svix_id = svix.id, "Duplicate webhook delivery ignored");
        return Ok(ack);
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(svix_id = svix.id, error = %e, "Signed webhook body is not an event envelope");
            return Ok(ack);
        }
    };

    let event_type = event.event_type.clone();
    match state.identity.handle_event(event).await {
        Ok(outcome) => {
            info!(svix_id = svix.id, event_type = %event_type, ?outcome, "Webhook processed");
        }
        Err(e) => {
            // Allow a manual resend of the same delivery to be applied later.
            state.replay_guard.forget(svix.id);
            error!(
                svix_id = svix.id,
                event_type = %event_type,
                error = %e,
                "Webhook handler failed"
            );
        }
    }

    Ok(ack)
}
