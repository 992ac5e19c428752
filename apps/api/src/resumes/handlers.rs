use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::resume::Resume;
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::resumes::service::SubmitResumeRequest;
use crate::state::AppState;

/// PUT /api/v1/resumes/me
pub async fn handle_submit_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitResumeRequest>,
) -> Result<ApiResponse<Resume>, AppError> {
    Ok(ApiResponse::ok(state.resumes.submit(claims.sub, req).await?))
}

/// GET /api/v1/resumes/me
pub async fn handle_get_my_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Resume>, AppError> {
    Ok(ApiResponse::ok(state.resumes.get(claims.sub).await?))
}

/// DELETE /api/v1/resumes/me
pub async fn handle_delete_my_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<()>, AppError> {
    state.resumes.delete(claims.sub).await?;
    Ok(ApiResponse::ok(()))
}

/// GET /api/v1/admin/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Resume>>, AppError> {
    Ok(ApiResponse::ok(state.resumes.list(page.into()).await?))
}

/// GET /api/v1/admin/resumes/:account_id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<ApiResponse<Resume>, AppError> {
    Ok(ApiResponse::ok(state.resumes.get(account_id).await?))
}
