use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::accounts::service::{
    AdminUpdateAccountRequest, AssignRolesRequest, ChangePasswordRequest, LoginRequest,
    LoginResponse, RegisterRequest, UpdateProfileRequest,
};
use crate::auth::token::Claims;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::account::{Account, AccountProfile};
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    let profile = state.accounts.register(req).await?;
    Ok(ApiResponse::created(profile))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let login = state.accounts.authenticate(req).await?;
    Ok(ApiResponse::ok(login))
}

/// GET /api/v1/accounts/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    Ok(ApiResponse::ok(state.accounts.profile(claims.sub).await?))
}

/// PUT /api/v1/accounts/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    let profile = state.accounts.update_profile(claims.sub, req).await?;
    Ok(ApiResponse::ok(profile))
}

/// PUT /api/v1/accounts/me/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state.accounts.change_password(claims.sub, req).await?;
    Ok(ApiResponse::ok(()))
}

/// GET /api/v1/admin/accounts
pub async fn handle_list_accounts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Account>>, AppError> {
    Ok(ApiResponse::ok(state.accounts.list(page.into()).await?))
}

/// GET /api/v1/admin/accounts/:id
pub async fn handle_get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    Ok(ApiResponse::ok(state.accounts.profile(id).await?))
}

/// PUT /api/v1/admin/accounts/:id
pub async fn handle_update_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateAccountRequest>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    Ok(ApiResponse::ok(state.accounts.admin_update(id, req).await?))
}

/// DELETE /api/v1/admin/accounts/:id
pub async fn handle_delete_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    state.accounts.deactivate(id).await?;
    Ok(ApiResponse::ok(()))
}

/// PUT /api/v1/admin/accounts/:id/roles
pub async fn handle_assign_roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRolesRequest>,
) -> Result<ApiResponse<AccountProfile>, AppError> {
    Ok(ApiResponse::ok(state.accounts.assign_roles(id, req).await?))
}
