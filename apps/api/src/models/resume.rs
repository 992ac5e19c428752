use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

/// At most one live resume per account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resume {
    pub id: Uuid,
    pub account_id: Uuid,
    pub education: String,
    pub work_experience: String,
    pub skills: String,
    pub expected_salary: Option<f64>,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Resume {
    const TABLE: &'static str = "resumes";
    const NAME: &'static str = "Resume";
}
