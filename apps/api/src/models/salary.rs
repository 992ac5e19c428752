use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalaryRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    /// `YYYY-MM`
    pub month: String,
    pub base_amount: f64,
    pub bonus: f64,
    pub deduction: f64,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for SalaryRecord {
    const TABLE: &'static str = "salary_records";
    const NAME: &'static str = "Salary record";
}

impl SalaryRecord {
    pub fn net_amount(&self) -> f64 {
        self.base_amount + self.bonus - self.deduction
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SalaryStatement {
    #[serde(flatten)]
    pub record: SalaryRecord,
    pub net_amount: f64,
}

impl From<SalaryRecord> for SalaryStatement {
    fn from(record: SalaryRecord) -> Self {
        let net_amount = record.net_amount();
        Self { record, net_amount }
    }
}
