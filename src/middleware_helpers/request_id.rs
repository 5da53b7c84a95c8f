use crate::tracing::{scope_request_id, RequestId};
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attaches a request id to the request, the task-local scope and the response.
///
/// A non-empty client-supplied `x-request-id` is kept when it is a valid header
/// value; otherwise a fresh uuid is used.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let (request_id, value) = request
        .headers()
        .get(&header)
        .filter(|v| !v.is_empty())
        .and_then(|v| Some((RequestId::new(v.to_str().ok()?), v.clone())))
        .unwrap_or_else(|| {
            let id = RequestId::generate();
            let value = HeaderValue::from_str(id.as_str())
                .unwrap_or(HeaderValue::from_static("unknown"));
            (id, value)
        });

    request.headers_mut().insert(header.clone(), value.clone());
    request.extensions_mut().insert(request_id.clone());

    let mut response = scope_request_id(request_id, next.run(request)).await;
    response.headers_mut().insert(header, value);
    response
}
