use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::{Json, Query};
use crate::models::salary::{SalaryRecord, SalaryStatement};
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::salary::service::GenerateSalaryRequest;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MonthQuery {
    pub month: String,
}

/// GET /api/v1/salaries?month=YYYY-MM
pub async fn handle_salary_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<MonthQuery>,
) -> Result<ApiResponse<SalaryStatement>, AppError> {
    Ok(ApiResponse::ok(state.salary.details(claims.sub, &q.month).await?))
}

/// GET /api/v1/salaries/history
pub async fn handle_salary_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<SalaryStatement>>, AppError> {
    Ok(ApiResponse::ok(state.salary.history(claims.sub, page.into()).await?))
}

/// POST /api/v1/admin/salaries/generate
pub async fn handle_generate_salary(
    State(state): State<AppState>,
    Json(req): Json<GenerateSalaryRequest>,
) -> Result<ApiResponse<SalaryStatement>, AppError> {
    Ok(ApiResponse::created(state.salary.generate(req).await?))
}

/// GET /api/v1/admin/salaries
pub async fn handle_list_salaries(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<SalaryRecord>>, AppError> {
    Ok(ApiResponse::ok(state.salary.list(page.into()).await?))
}
