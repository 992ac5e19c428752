use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::token::TokenIssuer;
use crate::cache::{keys, Cache, ACCOUNT_TTL};
use crate::errors::AppError;
use crate::models::account::{Account, AccountProfile, AccountType};
use crate::repository::{Changes, Page, Pagination, RepoError, Repository};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;

// ────────────────────────────────────────────────────────────────────────────
// Requests / responses
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub account_type: Option<AccountType>,
    pub department: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: AccountProfile,
}

/// Fields an account holder may change on their own profile.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Fields only an administrator may change.
#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateAccountRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub account_type: Option<AccountType>,
    pub is_active: Option<bool>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub base_salary: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub roles: Vec<String>,
}

/// Registration input after validation and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub account_type: AccountType,
    pub department: Option<String>,
    pub position: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation("email address is invalid".to_string())),
    }
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.len() < 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("phone number is invalid".to_string()));
    }
    Ok(())
}

/// Self-registration rules: a well-formed username, a long enough password,
/// at least one contact channel, and never the admin account type.
pub fn validate_registration(req: RegisterRequest) -> Result<NewAccount, AppError> {
    let username = req.username.trim().to_string();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "username must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '.', '-' and '_'".to_string(),
        ));
    }
    validate_password(&req.password)?;

    let phone = non_blank(req.phone);
    let email = non_blank(req.email).map(|e| e.to_lowercase());
    if phone.is_none() && email.is_none() {
        return Err(AppError::Validation(
            "a phone number or email address is required".to_string(),
        ));
    }
    if let Some(phone) = &phone {
        validate_phone(phone)?;
    }
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let account_type = req.account_type.unwrap_or(AccountType::Candidate);
    if account_type == AccountType::Admin {
        return Err(AppError::Validation(
            "administrator accounts cannot be self-registered".to_string(),
        ));
    }

    Ok(NewAccount {
        username,
        password: req.password,
        phone,
        email,
        account_type,
        department: non_blank(req.department),
        position: non_blank(req.position),
    })
}

/// Maps a unique violation on `accounts` to a message naming the field.
fn account_conflict(err: RepoError) -> AppError {
    if let RepoError::Database(sqlx::Error::Database(db)) = &err {
        if db.is_unique_violation() {
            let message = match db.constraint() {
                Some("accounts_phone_key") => "phone number already registered",
                Some("accounts_email_key") => "email address already registered",
                _ => "username already taken",
            };
            return AppError::Conflict(message.to_string());
        }
    }
    err.into()
}

fn authentication_failed() -> AppError {
    AppError::Unauthorized("authentication failed".to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AccountService {
    accounts: Repository<Account>,
    cache: Cache,
    tokens: TokenIssuer,
    auth_timeout: Duration,
}

impl AccountService {
    pub fn new(pool: PgPool, cache: Cache, tokens: TokenIssuer, auth_timeout: Duration) -> Self {
        Self {
            accounts: Repository::new(pool),
            cache,
            tokens,
            auth_timeout,
        }
    }

    fn pool(&self) -> &PgPool {
        self.accounts.pool()
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AccountProfile, AppError> {
        let input = validate_registration(req)?;
        self.ensure_available("username", &input.username, "username already taken")
            .await?;
        if let Some(phone) = &input.phone {
            self.ensure_available("phone", phone, "phone number already registered")
                .await?;
        }
        if let Some(email) = &input.email {
            self.ensure_available("email", email, "email address already registered")
                .await?;
        }

        let role = input.account_type.as_str();
        let profile = self.create_account(input, role).await?;
        info!(account_id = %profile.id, username = %profile.username, "Account registered");
        Ok(profile)
    }

    async fn ensure_available(
        &self,
        column: &'static str,
        value: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM accounts WHERE {column} = $1)");
        let taken: bool = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(self.pool())
            .await?;
        if taken {
            return Err(AppError::Conflict(message.to_string()));
        }
        Ok(())
    }

    /// Inserts the account and grants `role` in one transaction. The unique
    /// indexes back up the pre-checks when two registrations race.
    async fn create_account(
        &self,
        input: NewAccount,
        role: &str,
    ) -> Result<AccountProfile, AppError> {
        let password_hash = hash_password_blocking(input.password).await?;

        let mut tx = self.pool().begin().await?;
        let account = self
            .accounts
            .create_with(
                &mut *tx,
                Changes::new()
                    .set("username", input.username)
                    .set("password_hash", password_hash)
                    .set_opt("phone", input.phone)
                    .set_opt("email", input.email)
                    .set("account_type", input.account_type.as_str())
                    .set_opt("department", input.department)
                    .set_opt("position", input.position),
            )
            .await
            .map_err(account_conflict)?;

        grant_roles(&mut tx, account.id, &[role.to_string()])
            .await
            .map_err(|e| match e {
                AppError::Validation(_) => {
                    AppError::Internal(anyhow!("default role '{role}' is not provisioned"))
                }
                other => other,
            })?;
        tx.commit().await?;

        Ok(AccountProfile::new(account, vec![role.to_string()]))
    }

    /// Unknown user, inactive account and wrong password are indistinguishable
    /// to the caller.
    pub async fn authenticate(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        tokio::time::timeout(self.auth_timeout, self.authenticate_inner(req))
            .await
            .map_err(|_| {
                warn!("Authentication exceeded {:?}", self.auth_timeout);
                AppError::Timeout
            })?
    }

    async fn authenticate_inner(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let account: Option<Account> = sqlx::query_as(
            "SELECT * FROM accounts WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(req.username.trim())
        .fetch_optional(self.pool())
        .await?;

        let Some(account) = account else {
            return Err(authentication_failed());
        };
        if !account.is_active {
            return Err(authentication_failed());
        }
        if !verify_password_blocking(req.password, account.password_hash.clone()).await {
            return Err(authentication_failed());
        }

        let roles = self.roles_of(account.id).await?;
        let token = self.tokens.issue(account.id, roles.clone())?;
        let expires_at = Utc::now() + self.tokens.ttl();
        info!(account_id = %account.id, "Login succeeded");

        Ok(LoginResponse {
            token,
            expires_at,
            profile: AccountProfile::new(account, roles),
        })
    }

    pub async fn roles_of(&self, account_id: Uuid) -> Result<Vec<String>, AppError> {
        let roles = sqlx::query_scalar(
            r#"
            SELECT r.name FROM roles r
            JOIN account_roles ar ON ar.role_id = r.id
            WHERE ar.account_id = $1 AND r.deleted_at IS NULL
            ORDER BY r.name
            "#,
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;
        Ok(roles)
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        Ok(self.accounts.get_by_id(account_id).await?)
    }

    pub async fn profile(&self, account_id: Uuid) -> Result<AccountProfile, AppError> {
        self.cache
            .read_through(&keys::account(account_id), ACCOUNT_TTL, || async {
                let account = self.accounts.get_by_id(account_id).await?;
                let roles = self.roles_of(account_id).await?;
                Ok::<_, AppError>(AccountProfile::new(account, roles))
            })
            .await
    }

    pub async fn update_profile(
        &self,
        account_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<AccountProfile, AppError> {
        let phone = non_blank(req.phone);
        let email = non_blank(req.email).map(|e| e.to_lowercase());
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &email {
            validate_email(email)?;
        }

        self.accounts
            .update(
                account_id,
                Changes::new().set_opt("phone", phone).set_opt("email", email),
            )
            .await
            .map_err(account_conflict)?;
        self.cache.invalidate(&[keys::account(account_id)]).await?;
        self.profile(account_id).await
    }

    pub async fn change_password(
        &self,
        account_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        validate_password(&req.new_password)?;
        let account = self.accounts.get_by_id(account_id).await?;
        if !verify_password_blocking(req.current_password, account.password_hash).await {
            return Err(AppError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password_blocking(req.new_password).await?;
        self.accounts
            .update(account_id, Changes::new().set("password_hash", password_hash))
            .await?;
        info!(account_id = %account_id, "Password changed");
        Ok(())
    }

    // ── Administration ─────────────────────────────────────────────────────

    pub async fn list(&self, pagination: Pagination) -> Result<Page<Account>, AppError> {
        let (items, total) = self.accounts.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn admin_update(
        &self,
        account_id: Uuid,
        req: AdminUpdateAccountRequest,
    ) -> Result<AccountProfile, AppError> {
        if let Some(salary) = req.base_salary {
            if !salary.is_finite() || salary < 0.0 {
                return Err(AppError::Validation(
                    "base_salary must be a non-negative number".to_string(),
                ));
            }
        }
        let email = non_blank(req.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let phone = non_blank(req.phone);
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }

        let changes = Changes::new()
            .set_opt("phone", phone)
            .set_opt("email", email)
            .set_opt("account_type", req.account_type.map(|t| t.as_str()))
            .set_opt("is_active", req.is_active)
            .set_opt("department", non_blank(req.department))
            .set_opt("position", non_blank(req.position))
            .set_opt("hire_date", req.hire_date)
            .set_opt("base_salary", req.base_salary);

        self.accounts
            .update(account_id, changes)
            .await
            .map_err(account_conflict)?;
        self.cache.invalidate(&[keys::account(account_id)]).await?;
        self.profile(account_id).await
    }

    /// Soft delete. The account can no longer log in; its history stays.
    pub async fn deactivate(&self, account_id: Uuid) -> Result<(), AppError> {
        self.accounts.soft_delete(account_id).await?;
        self.cache.invalidate(&[keys::account(account_id)]).await?;
        info!(account_id = %account_id, "Account deactivated");
        Ok(())
    }

    /// Replaces the account's roles. Every name must exist.
    pub async fn assign_roles(
        &self,
        account_id: Uuid,
        req: AssignRolesRequest,
    ) -> Result<AccountProfile, AppError> {
        let mut roles: Vec<String> = req
            .roles
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        roles.sort();
        roles.dedup();
        if roles.is_empty() {
            return Err(AppError::Validation("at least one role is required".to_string()));
        }

        self.accounts.get_by_id(account_id).await?;

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM account_roles WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        grant_roles(&mut tx, account_id, &roles).await?;
        tx.commit().await?;

        self.cache.invalidate(&[keys::account(account_id)]).await?;
        info!(account_id = %account_id, roles = ?roles, "Roles assigned");
        self.profile(account_id).await
    }

    /// Creates the bootstrap administrator unless the username already exists.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<(), AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1)")
                .bind(username)
                .fetch_one(self.pool())
                .await?;
        if exists {
            info!("Bootstrap admin '{username}' already present");
            return Ok(());
        }

        validate_password(password)?;
        let input = NewAccount {
            username: username.to_string(),
            password: password.to_string(),
            phone: None,
            email: None,
            account_type: AccountType::Admin,
            department: None,
            position: None,
        };
        let profile = self
            .create_account(input, AccountType::Admin.as_str())
            .await?;
        info!(account_id = %profile.id, "Bootstrap admin '{username}' created");
        Ok(())
    }
}

/// Grants roles by name inside the caller's transaction. A missing role
/// aborts, leaving the caller to drop (and so roll back) the transaction.
async fn grant_roles(
    conn: &mut PgConnection,
    account_id: Uuid,
    roles: &[String],
) -> Result<(), AppError> {
    let found: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, name FROM roles WHERE name = ANY($1) AND deleted_at IS NULL")
            .bind(roles)
            .fetch_all(&mut *conn)
            .await?;

    if let Some(missing) = roles.iter().find(|r| !found.iter().any(|(_, n)| n == *r)) {
        return Err(AppError::Validation(format!("unknown role: {missing}")));
    }

    for (role_id, _) in &found {
        sqlx::query(
            "INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(account_id)
        .bind(role_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            phone: None,
            email: Some("Someone@Example.com".to_string()),
            account_type: None,
            department: None,
            position: None,
        }
    }

    #[test]
    fn test_registration_defaults_to_candidate() {
        let input = validate_registration(request("  ada_l ", "hunter22")).unwrap();
        assert_eq!(input.username, "ada_l");
        assert_eq!(input.account_type, AccountType::Candidate);
        assert_eq!(input.email.as_deref(), Some("someone@example.com"));
    }

    #[test]
    fn test_registration_rejects_admin_type() {
        let mut req = request("mallory", "hunter22");
        req.account_type = Some(AccountType::Admin);
        assert!(matches!(validate_registration(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_registration_requires_contact() {
        let mut req = request("ada_l", "hunter22");
        req.email = Some("   ".to_string());
        assert!(matches!(validate_registration(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_registration_field_rules() {
        assert!(validate_registration(request("ab", "hunter22")).is_err());
        assert!(validate_registration(request("bad name", "hunter22")).is_err());
        assert!(validate_registration(request("ada_l", "short")).is_err());

        let mut req = request("ada_l", "hunter22");
        req.email = Some("not-an-email".to_string());
        assert!(validate_registration(req).is_err());

        let mut req = request("ada_l", "hunter22");
        req.email = None;
        req.phone = Some("+8613800000000".to_string());
        assert!(validate_registration(req).is_ok());
    }
}

/// Database-backed tests. Run with `cargo test -- --ignored` and a
/// `DATABASE_URL` pointing at a disposable Postgres server.
#[cfg(test)]
mod db_tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::memory::MemoryStore;

    fn service(pool: PgPool) -> AccountService {
        AccountService::new(
            pool,
            Cache::new(Arc::new(MemoryStore::new())),
            TokenIssuer::new("test-secret-key-with-enough-length-123", chrono::Duration::hours(1)),
            Duration::from_secs(5),
        )
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "hunter22".to_string(),
            phone: None,
            email: Some(email.to_string()),
            account_type: Some(AccountType::Employee),
            department: Some("R&D".to_string()),
            position: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_register_then_authenticate(pool: PgPool) {
        let svc = service(pool);
        let profile = svc.register(register_request("ada", "ada@example.com")).await.unwrap();
        assert_eq!(profile.roles, vec!["employee".to_string()]);

        let login = svc
            .authenticate(LoginRequest {
                username: "ada".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        let claims = svc.tokens.parse(&login.token).unwrap();
        assert_eq!(claims.sub, profile.id);
        assert!(claims.has_role("employee"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_duplicate_username_conflicts(pool: PgPool) {
        let svc = service(pool);
        svc.register(register_request("ada", "ada@example.com")).await.unwrap();
        let err = svc
            .register(register_request("ada", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "username already taken"));

        let err = svc
            .register(register_request("grace", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "email address already registered"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_wrong_password_and_unknown_user_look_the_same(pool: PgPool) {
        let svc = service(pool);
        svc.register(register_request("ada", "ada@example.com")).await.unwrap();

        for (username, password) in [("ada", "wrong-password"), ("nobody", "hunter22")] {
            let err = svc
                .authenticate(LoginRequest {
                    username: username.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(ref m) if m == "authentication failed"));
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_profile_update_invalidates_cache(pool: PgPool) {
        let svc = service(pool);
        let profile = svc.register(register_request("ada", "ada@example.com")).await.unwrap();

        let cached = svc.profile(profile.id).await.unwrap();
        assert_eq!(cached.email.as_deref(), Some("ada@example.com"));

        svc.update_profile(
            profile.id,
            UpdateProfileRequest {
                email: Some("lovelace@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let fresh = svc.profile(profile.id).await.unwrap();
        assert_eq!(fresh.email.as_deref(), Some("lovelace@example.com"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_deactivated_account_cannot_log_in(pool: PgPool) {
        let svc = service(pool);
        let profile = svc.register(register_request("ada", "ada@example.com")).await.unwrap();
        svc.deactivate(profile.id).await.unwrap();

        let err = svc
            .authenticate(LoginRequest {
                username: "ada".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(matches!(svc.profile(profile.id).await, Err(AppError::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_assign_unknown_role_is_rejected(pool: PgPool) {
        let svc = service(pool);
        let profile = svc.register(register_request("ada", "ada@example.com")).await.unwrap();

        let err = svc
            .assign_roles(
                profile.id,
                AssignRolesRequest {
                    roles: vec!["admin".into(), "wizard".into()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "unknown role: wizard"));
        assert_eq!(svc.roles_of(profile.id).await.unwrap(), vec!["employee".to_string()]);

        let updated = svc
            .assign_roles(
                profile.id,
                AssignRolesRequest {
                    roles: vec!["admin".into(), "employee".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.roles, vec!["admin".to_string(), "employee".to_string()]);
    }
}
