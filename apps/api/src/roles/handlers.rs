use axum::extract::State;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::role::{Permission, Role, RoleWithPermissions};
use crate::repository::{Page, PageQuery};
use crate::response::ApiResponse;
use crate::roles::service::{CreatePermissionRequest, CreateRoleRequest, GrantPermissionsRequest};
use crate::state::AppState;

/// POST /api/v1/admin/roles
pub async fn handle_create_role(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<ApiResponse<Role>, AppError> {
    Ok(ApiResponse::created(state.roles.create_role(req).await?))
}

/// GET /api/v1/admin/roles
pub async fn handle_list_roles(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Role>>, AppError> {
    Ok(ApiResponse::ok(state.roles.list_roles(page.into()).await?))
}

/// GET /api/v1/admin/roles/:id
pub async fn handle_get_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    Ok(ApiResponse::ok(state.roles.get_role(id).await?))
}

/// POST /api/v1/admin/roles/:id/permissions
pub async fn handle_grant_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantPermissionsRequest>,
) -> Result<ApiResponse<RoleWithPermissions>, AppError> {
    Ok(ApiResponse::ok(state.roles.grant_permissions(id, req).await?))
}

/// POST /api/v1/admin/permissions
pub async fn handle_create_permission(
    State(state): State<AppState>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<ApiResponse<Permission>, AppError> {
    Ok(ApiResponse::created(state.roles.create_permission(req).await?))
}

/// GET /api/v1/admin/permissions
pub async fn handle_list_permissions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Permission>>, AppError> {
    Ok(ApiResponse::ok(state.roles.list_permissions(page.into()).await?))
}
