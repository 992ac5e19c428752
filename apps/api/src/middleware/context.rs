//! Per-request context: a fresh request id and an absolute deadline.
//!
//! The id is kept in a task-local so that any envelope built while the
//! request is in flight (including error envelopes) can carry it, and it is
//! echoed in the `X-Request-ID` response header. When the deadline passes
//! the inner future is dropped, which abandons any in-flight database or
//! cache call, and a 504 envelope is returned instead.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Id of the request currently being served on this task, if any.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Request extension for handlers that want the id explicitly.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_context(
    State(timeout): State<Duration>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let outcome = REQUEST_ID
        .scope(
            request_id.clone(),
            tokio::time::timeout(timeout, next.run(req)),
        )
        .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(_) => {
            warn!(request_id = %request_id, "Request exceeded {timeout:?}, abandoned");
            REQUEST_ID.sync_scope(request_id.clone(), || AppError::Timeout.into_response())
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
