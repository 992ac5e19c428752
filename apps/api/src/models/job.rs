use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

text_enum!(JobStatus {
    Open => "open",
    Closed => "closed",
});

text_enum!(ApplicationStatus {
    Pending => "pending",
    Interviewed => "interviewed",
    Hired => "hired",
    Rejected => "rejected",
});

impl ApplicationStatus {
    /// Hired and rejected are final.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        match self {
            ApplicationStatus::Pending => next != ApplicationStatus::Pending,
            ApplicationStatus::Interviewed => {
                matches!(next, ApplicationStatus::Hired | ApplicationStatus::Rejected)
            }
            ApplicationStatus::Hired | ApplicationStatus::Rejected => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary_range: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for JobPosting {
    const TABLE: &'static str = "job_postings";
    const NAME: &'static str = "Job posting";
}

impl JobPosting {
    /// Open and not past its expiry.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Open.as_str() && self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub account_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Application {
    const TABLE: &'static str = "applications";
    const NAME: &'static str = "Application";
}
