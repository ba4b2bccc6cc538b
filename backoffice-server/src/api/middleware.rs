//! Request logging

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use backoffice_core::{CorrelationId, LogContext};
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Log every request once it completes, at a level chosen by its status.
///
/// The `x-request-id` header is reused as the correlation id when present
/// and echoed on the response.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| CorrelationId::from_string(value.to_string()))
        .unwrap_or_default();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let context = LogContext::with_correlation_id(correlation_id, "http_request", "backoffice-server");
    let span = context.span();

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status();

    span.in_scope(|| {
        if status.is_server_error() {
            error!(%method, %path, status = status.as_u16(), latency_ms, "Request failed");
        } else if status.is_client_error() {
            warn!(%method, %path, status = status.as_u16(), latency_ms, "Request rejected");
        } else {
            info!(%method, %path, status = status.as_u16(), latency_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(context.correlation_id().as_str()) {
        response.headers_mut().insert(REQUEST_ID.clone(), value);
    }
    response
}
