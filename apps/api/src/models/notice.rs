use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

text_enum!(NoticeScope {
    All => "all",
    Department => "department",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notice {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub publish_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
    pub scope: String,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Notice {
    const TABLE: &'static str = "notices";
    const NAME: &'static str = "Notice";
}

impl Notice {
    /// Published, not expired, and addressed to everyone or to `department`.
    pub fn is_visible_to(&self, department: Option<&str>, now: DateTime<Utc>) -> bool {
        if self.publish_at > now || self.expire_at.is_some_and(|at| at <= now) {
            return false;
        }
        match NoticeScope::parse(&self.scope) {
            Some(NoticeScope::All) => true,
            Some(NoticeScope::Department) => matches!(
                (self.department.as_deref(), department),
                (Some(target), Some(own)) if target.eq_ignore_ascii_case(own)
            ),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NoticeReadMark {
    pub id: Uuid,
    pub account_id: Uuid,
    pub notice_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for NoticeReadMark {
    const TABLE: &'static str = "notice_reads";
    const NAME: &'static str = "Notice read mark";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn notice(scope: NoticeScope, department: Option<&str>) -> Notice {
        let now = Utc::now();
        Notice {
            id: Uuid::new_v4(),
            title: "Kickoff".into(),
            content: "Body".into(),
            publish_at: now - Duration::hours(1),
            expire_at: None,
            scope: scope.as_str().to_string(),
            department: department.map(String::from),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_department_notice_only_visible_to_its_department() {
        let now = Utc::now();
        let sales = notice(NoticeScope::Department, Some("Sales"));
        assert!(sales.is_visible_to(Some("sales"), now));
        assert!(!sales.is_visible_to(Some("R&D"), now));
        assert!(!sales.is_visible_to(None, now));
        assert!(notice(NoticeScope::All, None).is_visible_to(None, now));
    }

    #[test]
    fn test_unpublished_and_expired_notices_are_hidden() {
        let now = Utc::now();
        let mut scheduled = notice(NoticeScope::All, None);
        scheduled.publish_at = now + Duration::hours(1);
        assert!(!scheduled.is_visible_to(None, now));

        let mut expired = notice(NoticeScope::All, None);
        expired.expire_at = Some(now - Duration::minutes(1));
        assert!(!expired.is_visible_to(None, now));
    }
}
