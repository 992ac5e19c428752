use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::db;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
    pub version: &'static str,
}

fn check(ok: bool) -> &'static str {
    if ok {
        "available"
    } else {
        "unavailable"
    }
}

/// GET /api/v1/health
/// 200 when the database and the cache both answer, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (database, cache) = tokio::join!(db::ping(&state.db), state.cache.store().ping());

    if let Err(e) = &database {
        warn!("Health check: database unavailable: {e}");
    }
    if let Err(e) = &cache {
        warn!("Health check: cache unavailable: {e}");
    }

    let healthy = database.is_ok() && cache.is_ok();
    let (status, message) = if healthy {
        (StatusCode::OK, "available")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let report = HealthReport {
        status: message,
        database: check(database.is_ok()),
        cache: check(cache.is_ok()),
        version: env!("CARGO_PKG_VERSION"),
    };
    (status, Json(Envelope::new(status, message, Some(report))))
}
