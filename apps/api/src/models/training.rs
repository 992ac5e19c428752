use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

text_enum!(TrainingStatus {
    Registered => "registered",
    Completed => "completed",
    Canceled => "canceled",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingCourse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for TrainingCourse {
    const TABLE: &'static str = "training_courses";
    const NAME: &'static str = "Training course";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub course_id: Uuid,
    pub status: String,
    pub score: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for TrainingRecord {
    const TABLE: &'static str = "training_records";
    const NAME: &'static str = "Training record";
}
