use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Application, ApplicationStatus, JobPosting, JobStatus};
use crate::repository::{Changes, Page, Pagination, Repository};

const ALREADY_APPLIED: &str = "already applied for this job";

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary_range: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub salary_range: Option<String>,
    pub status: Option<JobStatus>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub status: ApplicationStatus,
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional_required(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    value.map(|v| required(field, &v)).transpose()
}

#[derive(Clone)]
pub struct JobService {
    jobs: Repository<JobPosting>,
    applications: Repository<Application>,
}

impl JobService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            jobs: Repository::new(pool.clone()),
            applications: Repository::new(pool),
        }
    }

    fn pool(&self) -> &PgPool {
        self.jobs.pool()
    }

    pub async fn create_job(&self, req: CreateJobRequest) -> Result<JobPosting, AppError> {
        if req.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(AppError::Validation(
                "expires_at must be in the future".to_string(),
            ));
        }
        let job = self
            .jobs
            .create(
                Changes::new()
                    .set("title", required("title", &req.title)?)
                    .set("description", required("description", &req.description)?)
                    .set("requirements", required("requirements", &req.requirements)?)
                    .set_opt("salary_range", req.salary_range)
                    .set("status", JobStatus::Open.as_str())
                    .set_opt("expires_at", req.expires_at),
            )
            .await?;
        info!(job_id = %job.id, title = %job.title, "Job posted");
        Ok(job)
    }

    pub async fn update_job(
        &self,
        job_id: Uuid,
        req: UpdateJobRequest,
    ) -> Result<JobPosting, AppError> {
        let changes = Changes::new()
            .set_opt("title", optional_required("title", req.title)?)
            .set_opt("description", optional_required("description", req.description)?)
            .set_opt("requirements", optional_required("requirements", req.requirements)?)
            .set_opt("salary_range", req.salary_range)
            .set_opt("status", req.status.map(|s| s.as_str()))
            .set_opt("expires_at", req.expires_at);
        self.jobs.update(job_id, changes).await?;
        self.get_job(job_id).await
    }

    pub async fn delete_job(&self, job_id: Uuid) -> Result<(), AppError> {
        self.jobs.soft_delete(job_id).await?;
        info!(job_id = %job_id, "Job removed");
        Ok(())
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobPosting, AppError> {
        Ok(self.jobs.get_by_id(job_id).await?)
    }

    /// Every live posting, open or not.
    pub async fn list_jobs(&self, pagination: Pagination) -> Result<Page<JobPosting>, AppError> {
        let (items, total) = self.jobs.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Postings that currently accept applications, newest first.
    pub async fn list_open_jobs(
        &self,
        pagination: Pagination,
    ) -> Result<Page<JobPosting>, AppError> {
        const OPEN: &str = "status = 'open' AND deleted_at IS NULL \
                            AND (expires_at IS NULL OR expires_at > now())";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM job_postings WHERE {OPEN}"))
                .fetch_one(self.pool())
                .await?;
        let items = sqlx::query_as::<_, JobPosting>(&format!(
            "SELECT * FROM job_postings WHERE {OPEN} ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;

        Ok(Page::new(items, total, pagination))
    }

    /// One transaction: the job must be live and open, and the caller must
    /// not have applied before. The unique index on (account_id, job_id)
    /// catches concurrent duplicates that slip past the check.
    pub async fn apply(&self, account_id: Uuid, job_id: Uuid) -> Result<Application, AppError> {
        let mut tx = self.pool().begin().await?;

        let job: Option<JobPosting> = sqlx::query_as(
            "SELECT * FROM job_postings WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;
        let job = job.ok_or_else(|| AppError::NotFound("Job posting not found".to_string()))?;
        if !job.accepts_applications(Utc::now()) {
            return Err(AppError::Conflict(
                "job is not accepting applications".to_string(),
            ));
        }

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM applications WHERE account_id = $1 AND job_id = $2)",
        )
        .bind(account_id)
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;
        if applied {
            return Err(AppError::Conflict(ALREADY_APPLIED.to_string()));
        }

        let application = self
            .applications
            .create_with(
                &mut *tx,
                Changes::new()
                    .set("account_id", account_id)
                    .set("job_id", job_id)
                    .set("status", ApplicationStatus::Pending.as_str()),
            )
            .await
            .map_err(|e| e.or_conflict(ALREADY_APPLIED))?;
        tx.commit().await?;

        info!(account_id = %account_id, job_id = %job_id, "Application submitted");
        Ok(application)
    }

    pub async fn applications_for_job(
        &self,
        job_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<Application>, AppError> {
        self.jobs.get_by_id(job_id).await?;
        self.applications_where("job_id", job_id, pagination).await
    }

    pub async fn applications_of(
        &self,
        account_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<Application>, AppError> {
        self.applications_where("account_id", account_id, pagination)
            .await
    }

    async fn applications_where(
        &self,
        column: &'static str,
        id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<Application>, AppError> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM applications WHERE {column} = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        let items = sqlx::query_as::<_, Application>(&format!(
            "SELECT * FROM applications WHERE {column} = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn update_application_status(
        &self,
        application_id: Uuid,
        req: UpdateApplicationRequest,
    ) -> Result<Application, AppError> {
        let application = self.applications.get_by_id(application_id).await?;
        let current = ApplicationStatus::parse(&application.status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "application {application_id} has unknown status '{}'",
                application.status
            ))
        })?;
        if !current.can_transition_to(req.status) {
            return Err(AppError::Conflict(format!(
                "application cannot move from {current} to {}",
                req.status
            )));
        }

        self.applications
            .update(
                application_id,
                Changes::new().set("status", req.status.as_str()),
            )
            .await?;
        info!(application_id = %application_id, status = %req.status, "Application status changed");
        Ok(self.applications.get_by_id(application_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("title", "  Engineer ").unwrap(), "Engineer");
        assert!(matches!(required("title", "  "), Err(AppError::Validation(ref m)) if m == "title is required"));
        assert_eq!(optional_required("title", None).unwrap(), None);
        assert!(optional_required("title", Some(String::new())).is_err());
    }
}
