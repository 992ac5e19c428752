use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::attendance::service::MonthQuery;
use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::Query;
use crate::models::attendance::{AttendanceRecord, StatusCount};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OwnMonthQuery {
    pub month: String,
}

/// POST /api/v1/attendance/clock-in
pub async fn handle_clock_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<AttendanceRecord>, AppError> {
    Ok(ApiResponse::created(state.attendance.clock_in(claims.sub).await?))
}

/// POST /api/v1/attendance/clock-out
pub async fn handle_clock_out(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<AttendanceRecord>, AppError> {
    Ok(ApiResponse::ok(state.attendance.clock_out(claims.sub).await?))
}

/// GET /api/v1/attendance?month=YYYY-MM
pub async fn handle_my_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<OwnMonthQuery>,
) -> Result<ApiResponse<Vec<AttendanceRecord>>, AppError> {
    let records = state.attendance.monthly(Some(claims.sub), &q.month).await?;
    Ok(ApiResponse::ok(records))
}

/// GET /api/v1/admin/attendance?month=YYYY-MM[&account_id=]
pub async fn handle_all_attendance(
    State(state): State<AppState>,
    Query(q): Query<MonthQuery>,
) -> Result<ApiResponse<Vec<AttendanceRecord>>, AppError> {
    let records = state.attendance.monthly(q.account_id, &q.month).await?;
    Ok(ApiResponse::ok(records))
}

/// GET /api/v1/admin/attendance/stats?month=YYYY-MM
pub async fn handle_attendance_stats(
    State(state): State<AppState>,
    Query(q): Query<OwnMonthQuery>,
) -> Result<ApiResponse<Vec<StatusCount>>, AppError> {
    Ok(ApiResponse::ok(state.attendance.stats(&q.month).await?))
}
