//! Request correlation for logs and error bodies.
//!
//! The request-id middleware tags each request with a [`RequestId`], makes it
//! reachable from any code running for that request via [`current_request_id`],
//! and the span built by [`configure_http_tracing`] records it.

use axum::http::Request;
use std::{fmt, future::Future};
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{MakeSpan, TraceLayer},
};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static REQUEST_ID: RequestId;
}

/// Runs `future` with `request_id` visible to [`current_request_id`].
pub async fn scope_request_id<Fut: Future>(request_id: RequestId, future: Fut) -> Fut::Output {
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<RequestId> {
    REQUEST_ID.try_with(RequestId::clone).ok()
}

/// Opens one `http.request` span per request, tagged with its request id.
#[derive(Clone, Copy, Default)]
pub struct PantrySpan;

impl<B> MakeSpan<B> for PantrySpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(RequestId::as_str)
            .unwrap_or("unknown");

        tracing::info_span!(
            "http.request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

pub type HttpTraceLayer = TraceLayer<SharedClassifier<StatusInRangeAsFailures>, PantrySpan>;

/// HTTP trace layer; only 5xx responses are logged as failures.
pub fn configure_http_tracing() -> HttpTraceLayer {
    TraceLayer::new(StatusInRangeAsFailures::new(500..=599).into_make_classifier())
        .make_span_with(PantrySpan)
}
