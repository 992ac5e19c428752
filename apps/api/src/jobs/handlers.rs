use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::jobs::service::{CreateJobRequest, UpdateApplicationRequest, UpdateJobRequest};
use crate::models::job::{Application, JobPosting};
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/jobs
pub async fn handle_list_open_jobs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<JobPosting>>, AppError> {
    Ok(ApiResponse::ok(state.jobs.list_open_jobs(page.into()).await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<JobPosting>, AppError> {
    Ok(ApiResponse::ok(state.jobs.get_job(id).await?))
}

/// POST /api/v1/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Application>, AppError> {
    Ok(ApiResponse::created(state.jobs.apply(claims.sub, id).await?))
}

/// GET /api/v1/applications/me
pub async fn handle_my_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Application>>, AppError> {
    let page = state.jobs.applications_of(claims.sub, page.into()).await?;
    Ok(ApiResponse::ok(page))
}

/// GET /api/v1/admin/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<JobPosting>>, AppError> {
    Ok(ApiResponse::ok(state.jobs.list_jobs(page.into()).await?))
}

/// POST /api/v1/admin/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<ApiResponse<JobPosting>, AppError> {
    Ok(ApiResponse::created(state.jobs.create_job(req).await?))
}

/// PUT /api/v1/admin/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<ApiResponse<JobPosting>, AppError> {
    Ok(ApiResponse::ok(state.jobs.update_job(id, req).await?))
}

/// DELETE /api/v1/admin/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    state.jobs.delete_job(id).await?;
    Ok(ApiResponse::ok(()))
}

/// GET /api/v1/admin/jobs/:id/applications
pub async fn handle_job_applications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Application>>, AppError> {
    Ok(ApiResponse::ok(
        state.jobs.applications_for_job(id, page.into()).await?,
    ))
}

/// PUT /api/v1/admin/applications/:id/status
pub async fn handle_update_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> Result<ApiResponse<Application>, AppError> {
    Ok(ApiResponse::ok(
        state.jobs.update_application_status(id, req).await?,
    ))
}
