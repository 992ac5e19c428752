use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::training::{TrainingCourse, TrainingRecord, TrainingStatus};
use crate::repository::{Changes, Page, Pagination, Repository};

const ALREADY_REGISTERED: &str = "already registered for this course";

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecordRequest {
    pub status: Option<TrainingStatus>,
    pub score: Option<i16>,
}

fn validate_course(req: &CreateCourseRequest) -> Result<(), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if req.ends_at <= req.starts_at {
        return Err(AppError::Validation(
            "ends_at must be after starts_at".to_string(),
        ));
    }
    if req.capacity.is_some_and(|c| c <= 0) {
        return Err(AppError::Validation("capacity must be positive".to_string()));
    }
    Ok(())
}

fn validate_score(score: Option<i16>) -> Result<(), AppError> {
    if score.is_some_and(|s| !(0..=100).contains(&s)) {
        return Err(AppError::Validation("score must be between 0 and 100".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TrainingService {
    courses: Repository<TrainingCourse>,
    records: Repository<TrainingRecord>,
}

impl TrainingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            courses: Repository::new(pool.clone()),
            records: Repository::new(pool),
        }
    }

    fn pool(&self) -> &PgPool {
        self.courses.pool()
    }

    pub async fn create_course(&self, req: CreateCourseRequest) -> Result<TrainingCourse, AppError> {
        validate_course(&req)?;
        let course = self
            .courses
            .create(
                Changes::new()
                    .set("title", req.title.trim())
                    .set("description", req.description)
                    .set("starts_at", req.starts_at)
                    .set("ends_at", req.ends_at)
                    .set_opt("location", req.location)
                    .set_opt("capacity", req.capacity),
            )
            .await?;
        info!(course_id = %course.id, title = %course.title, "Training course created");
        Ok(course)
    }

    pub async fn get_course(&self, course_id: Uuid) -> Result<TrainingCourse, AppError> {
        Ok(self.courses.get_by_id(course_id).await?)
    }

    /// Courses that have not ended yet, soonest first.
    pub async fn list_current(
        &self,
        pagination: Pagination,
    ) -> Result<Page<TrainingCourse>, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_courses WHERE ends_at > now() AND deleted_at IS NULL",
        )
        .fetch_one(self.pool())
        .await?;
        let items = sqlx::query_as::<_, TrainingCourse>(
            "SELECT * FROM training_courses WHERE ends_at > now() AND deleted_at IS NULL \
             ORDER BY starts_at, id LIMIT $1 OFFSET $2",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;
        Ok(Page::new(items, total, pagination))
    }

    /// The course row is locked for the duration so concurrent
    /// registrations cannot overshoot the capacity.
    pub async fn register(&self, account_id: Uuid, course_id: Uuid) -> Result<TrainingRecord, AppError> {
        let mut tx = self.pool().begin().await?;

        let course: Option<TrainingCourse> = sqlx::query_as(
            "SELECT * FROM training_courses WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        let course =
            course.ok_or_else(|| AppError::NotFound("Training course not found".to_string()))?;
        if course.ends_at <= Utc::now() {
            return Err(AppError::Conflict("course has already ended".to_string()));
        }

        let (mine, taken): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE account_id = $2), COUNT(*)
            FROM training_records
            WHERE course_id = $1 AND deleted_at IS NULL AND status <> 'canceled'
            "#,
        )
        .bind(course_id)
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;
        if mine > 0 {
            return Err(AppError::Conflict(ALREADY_REGISTERED.to_string()));
        }
        if course.capacity.is_some_and(|cap| taken >= i64::from(cap)) {
            return Err(AppError::Conflict("course is full".to_string()));
        }

        let record = self
            .records
            .create_with(
                &mut *tx,
                Changes::new()
                    .set("account_id", account_id)
                    .set("course_id", course_id)
                    .set("status", TrainingStatus::Registered.as_str()),
            )
            .await
            .map_err(|e| e.or_conflict(ALREADY_REGISTERED))?;
        tx.commit().await?;

        info!(account_id = %account_id, course_id = %course_id, "Registered for training");
        Ok(record)
    }

    pub async fn records_of(
        &self,
        account_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<TrainingRecord>, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_records WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_one(self.pool())
        .await?;
        let items = sqlx::query_as::<_, TrainingRecord>(
            "SELECT * FROM training_records WHERE account_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(account_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Administrative edit of status and/or score.
    pub async fn update_record(
        &self,
        record_id: Uuid,
        req: UpdateRecordRequest,
    ) -> Result<TrainingRecord, AppError> {
        validate_score(req.score)?;
        self.records
            .update(
                record_id,
                Changes::new()
                    .set_opt("status", req.status.map(|s| s.as_str()))
                    .set_opt("score", req.score),
            )
            .await?;
        Ok(self.records.get_by_id(record_id).await?)
    }

    /// Only the owner can cancel, and only while still registered.
    pub async fn cancel(&self, account_id: Uuid, record_id: Uuid) -> Result<TrainingRecord, AppError> {
        let record = self.records.get_by_id(record_id).await?;
        if record.account_id != account_id {
            return Err(AppError::NotFound("Training record not found".to_string()));
        }
        if record.status != TrainingStatus::Registered.as_str() {
            return Err(AppError::Conflict(format!(
                "a {} registration cannot be canceled",
                record.status
            )));
        }

        self.records
            .update(
                record_id,
                Changes::new().set("status", TrainingStatus::Canceled.as_str()),
            )
            .await?;
        info!(account_id = %account_id, record_id = %record_id, "Training registration canceled");
        Ok(self.records.get_by_id(record_id).await?)
    }
}
