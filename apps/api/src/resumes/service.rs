use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache::{keys, Cache, RESUME_TTL};
use crate::errors::AppError;
use crate::models::resume::Resume;
use crate::repository::{Changes, Page, Pagination, Repository};

#[derive(Debug, Deserialize)]
pub struct SubmitResumeRequest {
    pub education: String,
    pub work_experience: String,
    pub skills: String,
    pub expected_salary: Option<f64>,
    /// Name returned by the upload endpoint.
    pub file_path: Option<String>,
}

fn validate(req: &SubmitResumeRequest) -> Result<(), AppError> {
    for (field, value) in [
        ("education", &req.education),
        ("work_experience", &req.work_experience),
        ("skills", &req.skills),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }
    if req
        .expected_salary
        .is_some_and(|s| !s.is_finite() || s < 0.0)
    {
        return Err(AppError::Validation(
            "expected_salary must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ResumeService {
    resumes: Repository<Resume>,
    cache: Cache,
}

impl ResumeService {
    pub fn new(pool: PgPool, cache: Cache) -> Self {
        Self {
            resumes: Repository::new(pool),
            cache,
        }
    }

    fn pool(&self) -> &PgPool {
        self.resumes.pool()
    }

    /// Creates the account's resume or replaces the live one, then drops the
    /// cached copy.
    pub async fn submit(&self, account_id: Uuid, req: SubmitResumeRequest) -> Result<Resume, AppError> {
        validate(&req)?;

        let mut tx = self.pool().begin().await?;
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM resumes WHERE account_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let changes = Changes::new()
            .set("education", req.education)
            .set("work_experience", req.work_experience)
            .set("skills", req.skills)
            .set("expected_salary", req.expected_salary)
            .set_opt("file_path", req.file_path);

        let resume_id = match existing {
            Some(id) => {
                self.resumes.update_with(&mut *tx, id, changes).await?;
                id
            }
            None => {
                let created = self
                    .resumes
                    .create_with(&mut *tx, changes.set("account_id", account_id))
                    .await
                    .map_err(|e| e.or_conflict("resume was submitted concurrently, please retry"))?;
                created.id
            }
        };
        tx.commit().await?;

        self.cache.invalidate(&[keys::resume(account_id)]).await?;
        info!(account_id = %account_id, resume_id = %resume_id, "Resume submitted");
        Ok(self.resumes.get_by_id(resume_id).await?)
    }

    pub async fn get(&self, account_id: Uuid) -> Result<Resume, AppError> {
        self.cache
            .read_through(&keys::resume(account_id), RESUME_TTL, || async {
                let resume: Option<Resume> = sqlx::query_as(
                    "SELECT * FROM resumes WHERE account_id = $1 AND deleted_at IS NULL",
                )
                .bind(account_id)
                .fetch_optional(self.pool())
                .await?;
                resume.ok_or_else(|| AppError::NotFound("Resume not found".to_string()))
            })
            .await
    }

    pub async fn delete(&self, account_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE resumes SET deleted_at = now(), updated_at = now() \
             WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Resume not found".to_string()));
        }

        self.cache.invalidate(&[keys::resume(account_id)]).await?;
        info!(account_id = %account_id, "Resume deleted");
        Ok(())
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Page<Resume>, AppError> {
        let (items, total) = self.resumes.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }
}
