use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;

text_enum!(AccountType {
    Admin => "admin",
    Employee => "employee",
    Candidate => "candidate",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub account_type: String,
    pub is_active: bool,
    pub department: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub base_salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Account {
    const TABLE: &'static str = "accounts";
    const NAME: &'static str = "Account";
}

/// Public view of an account together with its role names. This is what
/// the profile cache holds; it never contains the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub account_type: String,
    pub is_active: bool,
    pub department: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub base_salary: f64,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AccountProfile {
    pub fn new(account: Account, roles: Vec<String>) -> Self {
        Self {
            id: account.id,
            username: account.username,
            phone: account.phone,
            email: account.email,
            account_type: account.account_type,
            is_active: account.is_active,
            department: account.department,
            position: account.position,
            hire_date: account.hire_date,
            base_salary: account.base_salary,
            roles,
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_round_trips_through_text() {
        assert_eq!(AccountType::parse("employee"), Some(AccountType::Employee));
        assert_eq!(AccountType::Candidate.as_str(), "candidate");
        assert_eq!(AccountType::parse("Admin"), None);
        assert_eq!(
            serde_json::to_string(&AccountType::Admin).unwrap(),
            "\"admin\""
        );
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            username: "ada".into(),
            phone: None,
            email: Some("ada@example.com".into()),
            password_hash: "$2b$12$secret".into(),
            account_type: "employee".into(),
            is_active: true,
            department: None,
            position: None,
            hire_date: None,
            base_salary: 0.0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
