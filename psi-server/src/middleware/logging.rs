//! Request logging middleware

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware: log each request and tag it with a request id
pub async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info!(request_id = %request_id, "Incoming request: {} {}", method, uri);

    let start = Instant::now();
    let mut response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        latency_ms = start.elapsed().as_millis() as u64,
        "Response status: {}",
        response.status().as_u16()
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
