//! Audit log: one line per request once the handler has finished,
//! whatever the outcome.

use std::time::{Duration, Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn};

use crate::auth::middleware::Actor;
use crate::middleware::context::REQUEST_ID_HEADER;

const SLOW_REQUEST: Duration = Duration::from_millis(200);

fn latency_millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

pub async fn audit(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    let latency = started.elapsed();
    let latency_ms = latency_millis(latency);
    let status = response.status().as_u16();
    let actor = response
        .extensions()
        .get::<Actor>()
        .map(|Actor(id)| id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    info!(
        target: "audit",
        %method, %path, status, latency_ms, %actor, %request_id,
        "request handled"
    );
    if latency > SLOW_REQUEST {
        warn!(target: "audit", %method, %path, latency_ms, "slow request");
    }

    response
}
