use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::attendance::policy::AttendancePolicy;
use crate::middleware::rate_limit::RateLimitConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub rust_log: String,
    pub db_max_connections: u32,
    pub jwt_ttl: chrono::Duration,
    pub request_timeout: Duration,
    pub auth_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub upload_dir: PathBuf,
    pub attendance: AttendancePolicy,
    /// Bootstrap administrator, created at startup when both are set.
    pub admin_credentials: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_ttl_hours: i64 = env_or("JWT_TTL_HOURS", 24)?;
        if jwt_ttl_hours <= 0 {
            anyhow::bail!("JWT_TTL_HOURS must be positive");
        }

        let rate_limit = RateLimitConfig {
            enabled: env_or("RATE_LIMIT_ENABLED", true)?,
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", 100)?,
            window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 60)?),
            exclude_paths: std::env::var("RATE_LIMIT_EXCLUDE_PATHS")
                .map(|v| parse_list(&v))
                .unwrap_or_else(|_| RateLimitConfig::default().exclude_paths),
            trust_forwarded: env_or("RATE_LIMIT_TRUST_FORWARDED", false)?,
        };

        let attendance = AttendancePolicy::from_strings(
            &std::env::var("ATTENDANCE_LATE_AFTER").unwrap_or_else(|_| "09:30".to_string()),
            &std::env::var("ATTENDANCE_EARLY_LEAVE_BEFORE")
                .unwrap_or_else(|_| "18:00".to_string()),
        )?;

        let admin_credentials = match (
            std::env::var("ADMIN_USERNAME").ok(),
            std::env::var("ADMIN_PASSWORD").ok(),
        ) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_ttl: chrono::Duration::hours(jwt_ttl_hours),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 30)?),
            auth_timeout: Duration::from_secs(env_or("AUTH_TIMEOUT_SECS", 5)?),
            rate_limit,
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            attendance,
            admin_credentials,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

/// Comma-separated list, blanks dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" /api/v1/health, ,/api/v1/uploads "),
            vec!["/api/v1/health", "/api/v1/uploads"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_env_or_falls_back_and_rejects_garbage() {
        assert_eq!(env_or::<u16>("TALENTDESK_TEST_UNSET_PORT", 8080).unwrap(), 8080);

        std::env::set_var("TALENTDESK_TEST_BAD_LIMIT", "lots");
        assert!(env_or::<u64>("TALENTDESK_TEST_BAD_LIMIT", 100).is_err());
        std::env::set_var("TALENTDESK_TEST_GOOD_LIMIT", " 250 ");
        assert_eq!(env_or::<u64>("TALENTDESK_TEST_GOOD_LIMIT", 100).unwrap(), 250);
    }
}
