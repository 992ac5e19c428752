use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::training::{TrainingCourse, TrainingRecord};
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::training::service::{CreateCourseRequest, UpdateRecordRequest};

/// GET /api/v1/trainings
pub async fn handle_list_courses(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<TrainingCourse>>, AppError> {
    Ok(ApiResponse::ok(state.training.list_current(page.into()).await?))
}

/// GET /api/v1/trainings/:id
pub async fn handle_get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<TrainingCourse>, AppError> {
    Ok(ApiResponse::ok(state.training.get_course(id).await?))
}

/// POST /api/v1/trainings/:id/register
pub async fn handle_register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<TrainingRecord>, AppError> {
    Ok(ApiResponse::created(state.training.register(claims.sub, id).await?))
}

/// GET /api/v1/training-records/me
pub async fn handle_my_records(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<TrainingRecord>>, AppError> {
    Ok(ApiResponse::ok(state.training.records_of(claims.sub, page.into()).await?))
}

/// POST /api/v1/training-records/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<TrainingRecord>, AppError> {
    Ok(ApiResponse::ok(state.training.cancel(claims.sub, id).await?))
}

/// POST /api/v1/admin/trainings
pub async fn handle_create_course(
    State(state): State<AppState>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<ApiResponse<TrainingCourse>, AppError> {
    Ok(ApiResponse::created(state.training.create_course(req).await?))
}

/// PUT /api/v1/admin/training-records/:id
pub async fn handle_update_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<ApiResponse<TrainingRecord>, AppError> {
    Ok(ApiResponse::ok(state.training.update_record(id, req).await?))
}
