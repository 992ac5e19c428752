use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::attendance::policy::month_bounds;
use crate::errors::AppError;
use crate::models::account::Account;
use crate::models::salary::{SalaryRecord, SalaryStatement};
use crate::repository::{Changes, Page, Pagination, Repository};

const ALREADY_GENERATED: &str = "salary for this month has already been generated";

#[derive(Debug, Deserialize)]
pub struct GenerateSalaryRequest {
    pub account_id: Uuid,
    /// `YYYY-MM`
    pub month: String,
    #[serde(default)]
    pub bonus: f64,
    #[serde(default)]
    pub deduction: f64,
    pub payment_date: Option<NaiveDate>,
}

fn non_negative(field: &str, amount: f64) -> Result<f64, AppError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(amount)
}

#[derive(Clone)]
pub struct SalaryService {
    salaries: Repository<SalaryRecord>,
    accounts: Repository<Account>,
}

impl SalaryService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            salaries: Repository::new(pool.clone()),
            accounts: Repository::new(pool),
        }
    }

    fn pool(&self) -> &PgPool {
        self.salaries.pool()
    }

    /// Once per (account, month). The base amount is the account's current
    /// base salary.
    pub async fn generate(&self, req: GenerateSalaryRequest) -> Result<SalaryStatement, AppError> {
        month_bounds(&req.month)?;
        let bonus = non_negative("bonus", req.bonus)?;
        let deduction = non_negative("deduction", req.deduction)?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM salary_records WHERE account_id = $1 AND month = $2)",
        )
        .bind(req.account_id)
        .bind(&req.month)
        .fetch_one(self.pool())
        .await?;
        if exists {
            return Err(AppError::Conflict(ALREADY_GENERATED.to_string()));
        }

        let account = self.accounts.get_by_id(req.account_id).await?;
        let record = self
            .salaries
            .create(
                Changes::new()
                    .set("account_id", account.id)
                    .set("month", req.month.as_str())
                    .set("base_amount", account.base_salary)
                    .set("bonus", bonus)
                    .set("deduction", deduction)
                    .set_opt("payment_date", req.payment_date),
            )
            .await
            .map_err(|e| e.or_conflict(ALREADY_GENERATED))?;

        info!(account_id = %account.id, month = %record.month, "Salary generated");
        Ok(record.into())
    }

    pub async fn details(
        &self,
        account_id: Uuid,
        month: &str,
    ) -> Result<SalaryStatement, AppError> {
        month_bounds(month)?;
        let record: Option<SalaryRecord> = sqlx::query_as(
            "SELECT * FROM salary_records WHERE account_id = $1 AND month = $2 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .bind(month)
        .fetch_optional(self.pool())
        .await?;
        record
            .map(SalaryStatement::from)
            .ok_or_else(|| AppError::NotFound("no salary record for this month".to_string()))
    }

    /// Newest month first.
    pub async fn history(
        &self,
        account_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<SalaryStatement>, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM salary_records WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_one(self.pool())
        .await?;
        let records = sqlx::query_as::<_, SalaryRecord>(
            "SELECT * FROM salary_records WHERE account_id = $1 AND deleted_at IS NULL \
             ORDER BY month DESC LIMIT $2 OFFSET $3",
        )
        .bind(account_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;

        let items = records.into_iter().map(SalaryStatement::from).collect();
        Ok(Page::new(items, total, pagination))
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Page<SalaryRecord>, AppError> {
        let (items, total) = self.salaries.list(pagination).await?;
        Ok(Page::new(items, total, pagination))
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;

    async fn seed_account(pool: &PgPool) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO accounts (username, password_hash, account_type, email, base_salary) \
             VALUES ('payee', 'x', 'employee', 'payee@example.com', 8000) RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn request(account_id: Uuid) -> GenerateSalaryRequest {
        GenerateSalaryRequest {
            account_id,
            month: "2024-05".into(),
            bonus: 500.0,
            deduction: 200.0,
            payment_date: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_generate_is_once_per_month(pool: PgPool) {
        let svc = SalaryService::new(pool.clone());
        let account = seed_account(&pool).await;

        let statement = svc.generate(request(account)).await.unwrap();
        assert_eq!(statement.record.base_amount, 8000.0);
        assert_eq!(statement.net_amount, 8300.0);

        let err = svc.generate(request(account)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == ALREADY_GENERATED));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM salary_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let details = svc.details(account, "2024-05").await.unwrap();
        assert_eq!(details.record.id, statement.record.id);
        assert!(matches!(
            svc.details(account, "2024-06").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_generate_for_unknown_account(pool: PgPool) {
        let svc = SalaryService::new(pool);
        let err = svc.generate(request(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Account not found"));
    }
}
