//! API middleware

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use core_kernel::Context;

use crate::AppState;

/// Gives every request its own cancellation [`Context`]
///
/// The context carries the configured request deadline and is cancelled
/// when the handler future is dropped (client gone, server shutting down).
pub async fn request_context(State(state): State<AppState>, mut request: Request<Body>, next: Next) -> Response {
    let (ctx, handle) = Context::background().with_timeout(state.request_timeout);
    request.extensions_mut().insert(ctx);
    let guard = CancelOnDrop(Some(handle));
    let response = next.run(request).await;
    guard.disarm();
    response
}

struct CancelOnDrop(Option<core_kernel::CancelHandle>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.cancel();
        }
    }
}

/// Audit logging middleware
///
/// Logs every API request with its outcome
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status();

    if status.is_server_error() {
        warn!(
            method = %method,
            uri = %uri,
            request_id = %request_id,
            status = status.as_u16(),
            duration_ms,
            "API request failed"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            request_id = %request_id,
            status = status.as_u16(),
            duration_ms,
            "API request"
        );
    }

    response
}
