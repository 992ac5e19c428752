use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::role::{Permission, Role, RoleWithPermissions};
use crate::repository::{Changes, Page, Pagination, Repository};

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionsRequest {
    pub permissions: Vec<String>,
}

/// Role names and permission codes: lowercase letters, digits, `_`, `:` and `.`.
fn normalize_identifier(kind: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim().to_lowercase();
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.'));
    if !valid {
        return Err(AppError::Validation(format!("{kind} is invalid")));
    }
    Ok(value)
}

#[derive(Clone)]
pub struct RoleService {
    roles: Repository<Role>,
    permissions: Repository<Permission>,
}

impl RoleService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            roles: Repository::new(pool.clone()),
            permissions: Repository::new(pool),
        }
    }

    pub async fn create_role(&self, req: CreateRoleRequest) -> Result<Role, AppError> {
        let name = normalize_identifier("role name", &req.name)?;
        let role = self
            .roles
            .create(
                Changes::new()
                    .set("name", name)
                    .set("description", req.description.trim()),
            )
            .await
            .map_err(|e| e.or_conflict("role already exists"))?;
        info!(role = %role.name, "Role created");
        Ok(role)
    }

    pub async fn list_roles(&self, pagination: Pagination) -> Result<Page<Role>, AppError> {
        let (items, total) = self.roles.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<RoleWithPermissions, AppError> {
        let role = self.roles.get_by_id(role_id).await?;
        let permissions = self.permission_codes(role_id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn permission_codes(&self, role_id: Uuid) -> Result<Vec<String>, AppError> {
        let codes = sqlx::query_scalar(
            r#"
            SELECT p.code FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1 AND p.deleted_at IS NULL
            ORDER BY p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(self.roles.pool())
        .await?;
        Ok(codes)
    }

    pub async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, AppError> {
        let code = normalize_identifier("permission code", &req.code)?;
        let permission = self
            .permissions
            .create(
                Changes::new()
                    .set("code", code)
                    .set("description", req.description.trim()),
            )
            .await
            .map_err(|e| e.or_conflict("permission already exists"))?;
        info!(permission = %permission.code, "Permission created");
        Ok(permission)
    }

    pub async fn list_permissions(
        &self,
        pagination: Pagination,
    ) -> Result<Page<Permission>, AppError> {
        let (items, total) = self.permissions.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Adds grants; codes already granted are left alone.
    pub async fn grant_permissions(
        &self,
        role_id: Uuid,
        req: GrantPermissionsRequest,
    ) -> Result<RoleWithPermissions, AppError> {
        let codes = req
            .permissions
            .iter()
            .map(|c| normalize_identifier("permission code", c))
            .collect::<Result<Vec<_>, _>>()?;
        if codes.is_empty() {
            return Err(AppError::Validation(
                "at least one permission is required".to_string(),
            ));
        }

        self.roles.get_by_id(role_id).await?;

        let mut tx = self.roles.pool().begin().await?;
        let found: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, code FROM permissions WHERE code = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&codes)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(missing) = codes.iter().find(|c| !found.iter().any(|(_, f)| f == *c)) {
            return Err(AppError::Validation(format!("unknown permission: {missing}")));
        }

        for (permission_id, _) in &found {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.get_role(role_id).await
    }
}
