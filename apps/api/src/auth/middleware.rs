//! Authentication and authorization guards.
//!
//! `require_auth` validates the bearer token and places the `Claims` in the
//! request extensions for handlers (`Extension<Claims>`). It also tags the
//! response with the `Actor` so the audit layer can attribute the request.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::token::Claims;
use crate::auth::ADMIN_ROLE;
use crate::errors::AppError;
use crate::state::AppState;

/// Identity of the caller, attached to responses of authenticated requests.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("authentication token required".to_string()))?;

    let claims = state.tokens.parse(token)?;
    debug!(account_id = %claims.sub, roles = ?claims.roles, "Token accepted");

    let actor = Actor(claims.sub);
    req.extensions_mut().insert(claims);

    let mut response = next.run(req).await;
    response.extensions_mut().insert(actor);
    Ok(response)
}

/// Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("authentication token required".to_string()))?;

    if !claims.has_role(ADMIN_ROLE) {
        return Err(AppError::Forbidden("administrator role required".to_string()));
    }
    Ok(next.run(req).await)
}
