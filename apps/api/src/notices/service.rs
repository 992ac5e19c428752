//! Active notices are read through the cache: one list for everything
//! currently published, and one per department holding the notices that
//! department can see (`all` scope plus its own). Every write drops the
//! global list and all department lists, since an `all` notice shows up in
//! each of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache::{keys, Cache, NOTICES_TTL};
use crate::errors::AppError;
use crate::models::account::Account;
use crate::models::notice::{Notice, NoticeScope};
use crate::repository::{Changes, Repository};

const ACTIVE: &str = "deleted_at IS NULL AND publish_at <= now() \
                      AND (expire_at IS NULL OR expire_at > now())";

#[derive(Debug, Deserialize)]
pub struct CreateNoticeRequest {
    pub title: String,
    pub content: String,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub scope: Option<NoticeScope>,
    pub department: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNoticeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub scope: Option<NoticeScope>,
    pub department: Option<String>,
}

/// A notice as seen by one account.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    #[serde(flatten)]
    pub notice: Notice,
    pub read: bool,
}

fn check_window(
    publish_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    let publish_at = publish_at.unwrap_or_else(Utc::now);
    if expire_at.is_some_and(|expire| expire <= publish_at) {
        return Err(AppError::Validation(
            "expire_at must be after publish_at".to_string(),
        ));
    }
    Ok(())
}

/// Department-scoped notices need a department; `all` notices carry none.
fn scoped_department(
    scope: NoticeScope,
    department: Option<String>,
) -> Result<Option<String>, AppError> {
    let department = department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    match (scope, department) {
        (NoticeScope::Department, None) => Err(AppError::Validation(
            "department is required for department notices".to_string(),
        )),
        (NoticeScope::Department, dept) => Ok(dept),
        (NoticeScope::All, _) => Ok(None),
    }
}

fn not_blank(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct NoticeService {
    notices: Repository<Notice>,
    accounts: Repository<Account>,
    cache: Cache,
}

impl NoticeService {
    pub fn new(pool: PgPool, cache: Cache) -> Self {
        Self {
            notices: Repository::new(pool.clone()),
            accounts: Repository::new(pool),
            cache,
        }
    }

    fn pool(&self) -> &PgPool {
        self.notices.pool()
    }

    pub async fn create(&self, req: CreateNoticeRequest) -> Result<Notice, AppError> {
        not_blank("title", &req.title)?;
        not_blank("content", &req.content)?;
        check_window(req.publish_at, req.expire_at)?;
        let scope = req.scope.unwrap_or(NoticeScope::All);
        let department = scoped_department(scope, req.department)?;

        let notice = self
            .notices
            .create(
                Changes::new()
                    .set("title", req.title.trim())
                    .set("content", req.content)
                    .set_opt("publish_at", req.publish_at)
                    .set_opt("expire_at", req.expire_at)
                    .set("scope", scope.as_str())
                    .set_opt("department", department),
            )
            .await?;

        self.invalidate_lists().await?;
        info!(notice_id = %notice.id, scope = %notice.scope, "Notice published");
        Ok(notice)
    }

    pub async fn update(&self, notice_id: Uuid, req: UpdateNoticeRequest) -> Result<Notice, AppError> {
        let current = self.notices.get_by_id(notice_id).await?;
        if let Some(title) = &req.title {
            not_blank("title", title)?;
        }
        if let Some(content) = &req.content {
            not_blank("content", content)?;
        }
        check_window(
            req.publish_at.or(Some(current.publish_at)),
            req.expire_at.or(current.expire_at),
        )?;

        let scope = req
            .scope
            .or_else(|| NoticeScope::parse(&current.scope))
            .unwrap_or(NoticeScope::All);
        let department = scoped_department(scope, req.department.or(current.department))?;

        let changes = Changes::new()
            .set_opt("title", req.title.map(|t| t.trim().to_string()))
            .set_opt("content", req.content)
            .set_opt("publish_at", req.publish_at)
            .set_opt("expire_at", req.expire_at)
            .set("scope", scope.as_str())
            .set("department", department);
        self.notices.update(notice_id, changes).await?;

        self.invalidate_lists().await?;
        Ok(self.notices.get_by_id(notice_id).await?)
    }

    /// Notices are removed physically; their read marks go with them.
    pub async fn delete(&self, notice_id: Uuid) -> Result<(), AppError> {
        self.notices.hard_delete(notice_id).await?;
        self.invalidate_lists().await?;
        info!(notice_id = %notice_id, "Notice deleted");
        Ok(())
    }

    pub async fn get(&self, notice_id: Uuid) -> Result<Notice, AppError> {
        Ok(self.notices.get_by_id(notice_id).await?)
    }

    /// A notice the account may see. Anything else, including notices
    /// scheduled for later, reads as missing.
    pub async fn get_for(&self, account_id: Uuid, notice_id: Uuid) -> Result<Notice, AppError> {
        let notice = self.notices.get_by_id(notice_id).await?;
        let account = self.accounts.get_by_id(account_id).await?;
        if !notice.is_visible_to(account.department.as_deref(), Utc::now()) {
            return Err(AppError::NotFound("Notice not found".to_string()));
        }
        Ok(notice)
    }

    /// Every currently published notice, newest first.
    pub async fn active(&self) -> Result<Vec<Notice>, AppError> {
        self.cache
            .read_through(keys::ACTIVE_NOTICES, NOTICES_TTL, || async {
                let notices = sqlx::query_as::<_, Notice>(&format!(
                    "SELECT * FROM notices WHERE {ACTIVE} ORDER BY publish_at DESC, id"
                ))
                .fetch_all(self.pool())
                .await?;
                Ok::<_, AppError>(notices)
            })
            .await
    }

    /// Active notices addressed to everyone or to `department`.
    pub async fn for_department(&self, department: &str) -> Result<Vec<Notice>, AppError> {
        self.cache
            .read_through(&keys::department_notices(department), NOTICES_TTL, || async {
                let notices = sqlx::query_as::<_, Notice>(&format!(
                    "SELECT * FROM notices WHERE {ACTIVE} \
                     AND (scope = 'all' OR lower(department) = lower($1)) \
                     ORDER BY publish_at DESC, id"
                ))
                .bind(department)
                .fetch_all(self.pool())
                .await?;
                Ok::<_, AppError>(notices)
            })
            .await
    }

    /// What the account can see, each flagged with its read state.
    pub async fn visible_to(&self, account_id: Uuid) -> Result<Vec<NoticeView>, AppError> {
        let account = self.accounts.get_by_id(account_id).await?;
        let notices = match account.department.as_deref() {
            Some(department) => self.for_department(department).await?,
            None => self
                .active()
                .await?
                .into_iter()
                .filter(|n| n.scope == NoticeScope::All.as_str())
                .collect(),
        };

        let read: Vec<Uuid> = sqlx::query_scalar(
            "SELECT notice_id FROM notice_reads WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        Ok(notices
            .into_iter()
            .map(|notice| {
                let read = read.contains(&notice.id);
                NoticeView { notice, read }
            })
            .collect())
    }

    /// Idempotent: marking an already-read notice succeeds without adding a row.
    pub async fn mark_read(&self, account_id: Uuid, notice_id: Uuid) -> Result<(), AppError> {
        self.get_for(account_id, notice_id).await?;
        sqlx::query(
            "INSERT INTO notice_reads (account_id, notice_id) VALUES ($1, $2) \
             ON CONFLICT (account_id, notice_id) DO NOTHING",
        )
        .bind(account_id)
        .bind(notice_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn invalidate_lists(&self) -> Result<(), AppError> {
        let departments: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT department FROM accounts
            WHERE department IS NOT NULL AND deleted_at IS NULL
            UNION
            SELECT DISTINCT department FROM notices WHERE department IS NOT NULL
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut stale = vec![keys::ACTIVE_NOTICES.to_string()];
        stale.extend(departments.iter().map(|d| keys::department_notices(d)));
        stale.sort();
        stale.dedup();
        self.cache.invalidate(&stale).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_department_scope_requires_department() {
        assert!(scoped_department(NoticeScope::Department, Some("  ".into())).is_err());
        assert_eq!(
            scoped_department(NoticeScope::Department, Some(" Sales ".into())).unwrap(),
            Some("Sales".to_string())
        );
        assert_eq!(scoped_department(NoticeScope::All, Some("Sales".into())).unwrap(), None);
    }

    #[test]
    fn test_expiry_must_follow_publication() {
        let now = Utc::now();
        assert!(check_window(Some(now), Some(now + Duration::hours(1))).is_ok());
        assert!(check_window(Some(now), Some(now)).is_err());
        assert!(check_window(None, Some(now - Duration::hours(1))).is_err());
        assert!(check_window(None, None).is_ok());
    }
}
