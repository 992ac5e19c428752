//! Fixed-window rate limiting keyed by client identity.
//!
//! Counters live in the shared cache store so every instance enforces the
//! same budget. If the store cannot be reached the request is let through.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::cache::{keys, CacheError, CacheStore};
use crate::errors::AppError;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const GLOBAL_CLIENT: &str = "global";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u64,
    pub window: Duration,
    /// Path prefixes that bypass the limiter.
    pub exclude_paths: Vec<String>,
    /// Key clients by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(60),
            exclude_paths: vec!["/api/v1/health".to_string()],
            trust_forwarded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl Decision {
    /// Whole seconds until the window resets, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.reset_after.as_millis() as u64;
        millis.div_ceil(1000).max(1)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn skips(&self, path: &str) -> bool {
        !self.config.enabled
            || self.config.exclude_paths.iter().any(|prefix| {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    pub async fn check(&self, client: &str) -> Result<Decision, CacheError> {
        let (count, reset_after) = self
            .store
            .incr_window(&keys::rate_limit(client), self.config.window)
            .await?;
        let limit = self.config.max_requests;
        Ok(Decision {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_after,
        })
    }
}

/// The peer address, else a shared bucket. The first `X-Forwarded-For` hop
/// wins only when `trust_forwarded` is set; otherwise a client could pick a
/// new identity per request.
pub fn client_identity(req: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| GLOBAL_CLIENT.to_string())
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limiter.skips(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let client = client_identity(&req, limiter.config.trust_forwarded);
    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(client = %client, "Rate limiter store unavailable, allowing request: {e}");
            return Ok(next.run(req).await);
        }
    };

    if !decision.allowed {
        debug!(client = %client, limit = decision.limit, "Rate limit exceeded");
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        });
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    Ok(response)
}
