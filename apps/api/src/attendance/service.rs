use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::attendance::policy::{month_bounds, AttendancePolicy};
use crate::errors::AppError;
use crate::models::attendance::{AttendanceRecord, AttendanceStatus, StatusCount};
use crate::repository::{Changes, Repository};

const ALREADY_CLOCKED_IN: &str = "already clocked in today";

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: String,
    pub account_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct AttendanceService {
    records: Repository<AttendanceRecord>,
    policy: AttendancePolicy,
}

impl AttendanceService {
    pub fn new(pool: PgPool, policy: AttendancePolicy) -> Self {
        Self {
            records: Repository::new(pool),
            policy,
        }
    }

    fn pool(&self) -> &PgPool {
        self.records.pool()
    }

    pub async fn clock_in(&self, account_id: Uuid) -> Result<AttendanceRecord, AppError> {
        self.clock_in_at(account_id, Local::now()).await
    }

    /// At most one record per account per local calendar date; the partial
    /// unique index on (account_id, work_date) backs the check.
    pub(crate) async fn clock_in_at(
        &self,
        account_id: Uuid,
        now: DateTime<Local>,
    ) -> Result<AttendanceRecord, AppError> {
        let today = now.date_naive();
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM attendance_records \
             WHERE account_id = $1 AND work_date = $2 AND deleted_at IS NULL)",
        )
        .bind(account_id)
        .bind(today)
        .fetch_one(self.pool())
        .await?;
        if exists {
            return Err(AppError::Conflict(ALREADY_CLOCKED_IN.to_string()));
        }

        let status = self.policy.clock_in_status(now.time());
        let record = self
            .records
            .create(
                Changes::new()
                    .set("account_id", account_id)
                    .set("clock_in", now.with_timezone(&Utc))
                    .set("work_date", today)
                    .set("status", status.as_str()),
            )
            .await
            .map_err(|e| e.or_conflict(ALREADY_CLOCKED_IN))?;

        info!(account_id = %account_id, status = %status, "Clocked in");
        Ok(record)
    }

    pub async fn clock_out(&self, account_id: Uuid) -> Result<AttendanceRecord, AppError> {
        self.clock_out_at(account_id, Local::now()).await
    }

    /// Closes the latest open record for today.
    pub(crate) async fn clock_out_at(
        &self,
        account_id: Uuid,
        now: DateTime<Local>,
    ) -> Result<AttendanceRecord, AppError> {
        let early = self.policy.is_early_leave(now.time());
        let record: Option<AttendanceRecord> = sqlx::query_as(
            r#"
            UPDATE attendance_records
            SET clock_out = $1,
                status = CASE WHEN $2 THEN $3 ELSE status END,
                updated_at = now()
            WHERE id = (
                SELECT id FROM attendance_records
                WHERE account_id = $4 AND work_date = $5
                  AND clock_out IS NULL AND deleted_at IS NULL
                ORDER BY clock_in DESC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now.with_timezone(&Utc))
        .bind(early)
        .bind(AttendanceStatus::EarlyLeave.as_str())
        .bind(account_id)
        .bind(now.date_naive())
        .fetch_optional(self.pool())
        .await?;

        let record = record.ok_or_else(|| {
            AppError::NotFound("no open attendance record for today".to_string())
        })?;
        info!(account_id = %account_id, status = %record.status, "Clocked out");
        Ok(record)
    }

    /// Records dated within `month`, oldest first. `None` means all accounts.
    pub async fn monthly(
        &self,
        account_id: Option<Uuid>,
        month: &str,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let (start, end) = month_bounds(month)?;
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance_records
            WHERE work_date >= $1 AND work_date < $2 AND deleted_at IS NULL
              AND ($3::uuid IS NULL OR account_id = $3)
            ORDER BY work_date, clock_in
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;
        Ok(records)
    }

    pub async fn stats(&self, month: &str) -> Result<Vec<StatusCount>, AppError> {
        let (start, end) = month_bounds(month)?;
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count FROM attendance_records
            WHERE work_date >= $1 AND work_date < $2 AND deleted_at IS NULL
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(counts)
    }
}
