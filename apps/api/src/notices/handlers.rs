use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::auth::token::Claims;
use crate::auth::ADMIN_ROLE;
use crate::errors::AppError;
use crate::extract::{Json, Path};
use crate::models::notice::Notice;
use crate::notices::service::{CreateNoticeRequest, NoticeView, UpdateNoticeRequest};
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/notices
pub async fn handle_my_notices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<NoticeView>>, AppError> {
    Ok(ApiResponse::ok(state.notices.visible_to(claims.sub).await?))
}

/// GET /api/v1/notices/:id
/// Administrators see every notice; others only what `visible_to` would list.
pub async fn handle_get_notice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Notice>, AppError> {
    let notice = if claims.has_role(ADMIN_ROLE) {
        state.notices.get(id).await?
    } else {
        state.notices.get_for(claims.sub, id).await?
    };
    Ok(ApiResponse::ok(notice))
}

/// POST /api/v1/notices/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    state.notices.mark_read(claims.sub, id).await?;
    Ok(ApiResponse::ok(()))
}

/// GET /api/v1/admin/notices
pub async fn handle_active_notices(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Notice>>, AppError> {
    Ok(ApiResponse::ok(state.notices.active().await?))
}

/// POST /api/v1/admin/notices
pub async fn handle_create_notice(
    State(state): State<AppState>,
    Json(req): Json<CreateNoticeRequest>,
) -> Result<ApiResponse<Notice>, AppError> {
    Ok(ApiResponse::created(state.notices.create(req).await?))
}

/// PUT /api/v1/admin/notices/:id
pub async fn handle_update_notice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNoticeRequest>,
) -> Result<ApiResponse<Notice>, AppError> {
    Ok(ApiResponse::ok(state.notices.update(id, req).await?))
}

/// DELETE /api/v1/admin/notices/:id
pub async fn handle_delete_notice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    state.notices.delete(id).await?;
    Ok(ApiResponse::ok(()))
}
