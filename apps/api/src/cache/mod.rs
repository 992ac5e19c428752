//! Cache-aside accessor over a shared key-value store.
//!
//! Read path: `read_through` serves hits without touching the database and
//! populates the cache on a miss. Population is best-effort; a failed write
//! is logged and the freshly loaded value is still returned.
//!
//! Write path: `invalidate` must succeed. Services call it right after the
//! write commits and propagate its error, since a stale entry would outlive
//! the write for a full TTL.

#[cfg(test)]
pub mod memory;
pub mod redis_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;

pub const ACCOUNT_TTL: Duration = Duration::from_secs(60 * 60);
pub const RESUME_TTL: Duration = Duration::from_secs(60 * 60);
pub const NOTICES_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Minimal key-value contract the rest of the crate depends on.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Increments the counter at `key`, starting a window of length `window`
    /// when the counter is created. Returns the new count and the time left
    /// in the window.
    async fn incr_window(&self, key: &str, window: Duration)
        -> Result<(u64, Duration), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Deterministic cache keys: entity type plus identifying field.
pub mod keys {
    use uuid::Uuid;

    pub const ACTIVE_NOTICES: &str = "notices:active";

    pub fn account(account_id: Uuid) -> String {
        format!("account:{account_id}")
    }

    pub fn resume(account_id: Uuid) -> String {
        format!("resume:{account_id}")
    }

    pub fn department_notices(department: &str) -> String {
        format!("notices:department:{}", department.to_lowercase())
    }

    pub fn rate_limit(client: &str) -> String {
        format!("rate_limit:{client}")
    }
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set_object<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, json, ttl).await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.store.delete(keys).await
    }

    /// Returns the cached value for `key`, or loads it with `load` and caches
    /// the result. An unreadable cache entry counts as a miss.
    pub async fn read_through<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        match self.get_object::<T>(key).await {
            Ok(Some(value)) => {
                debug!("Cache hit for key: {key}");
                return Ok(value);
            }
            Ok(None) => debug!("Cache miss for key: {key}"),
            Err(e) => warn!("Cache read failed for key {key} ({e}), falling back to database"),
        }

        let value = load().await?;

        if let Err(e) = self.set_object(key, &value, ttl).await {
            warn!("Failed to populate cache for key {key}: {e}");
        }
        Ok(value)
    }

    /// Write-path invalidation; errors propagate to the caller.
    pub async fn invalidate(&self, keys: &[String]) -> Result<(), AppError> {
        self.delete(keys).await.map_err(|e| {
            warn!("Cache invalidation failed for {keys:?}: {e}");
            AppError::Cache(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    fn cache_with(store: Arc<MemoryStore>) -> Cache {
        Cache::new(store)
    }

    #[tokio::test]
    async fn test_hit_skips_loader() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        cache
            .set_object("account:1", &Profile { name: "ada".into() }, ACCOUNT_TTL)
            .await
            .unwrap();

        let calls = AtomicUsize::new(0);
        let value: Profile = cache
            .read_through("account:1", ACCOUNT_TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Profile { name: "db".into() })
            })
            .await
            .unwrap();

        assert_eq!(value.name, "ada");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_loads_and_populates() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone());

        let value: Profile = cache
            .read_through("account:2", ACCOUNT_TTL, || async {
                Ok(Profile { name: "grace".into() })
            })
            .await
            .unwrap();
        assert_eq!(value.name, "grace");

        let cached: Option<Profile> = cache.get_object("account:2").await.unwrap();
        assert_eq!(cached, Some(Profile { name: "grace".into() }));
    }

    #[tokio::test]
    async fn test_populate_failure_is_not_propagated() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let cache = cache_with(store);

        let value: Profile = cache
            .read_through("account:3", ACCOUNT_TTL, || async {
                Ok(Profile { name: "linus".into() })
            })
            .await
            .unwrap();
        assert_eq!(value.name, "linus");
    }

    #[tokio::test]
    async fn test_invalidation_failure_is_propagated() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let cache = cache_with(store);

        let err = cache
            .invalidate(&[keys::account(uuid::Uuid::nil())])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cache(_)));
    }

    #[tokio::test]
    async fn test_read_after_invalidation_sees_new_value() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let key = "resume:42";

        let first: Profile = cache
            .read_through(key, RESUME_TTL, || async { Ok(Profile { name: "v1".into() }) })
            .await
            .unwrap();
        assert_eq!(first.name, "v1");

        // A write commits, then invalidates.
        cache.invalidate(&[key.to_string()]).await.unwrap();

        let second: Profile = cache
            .read_through(key, RESUME_TTL, || async { Ok(Profile { name: "v2".into() }) })
            .await
            .unwrap();
        assert_eq!(second.name, "v2");
    }

    #[tokio::test]
    async fn test_corrupt_entry_counts_as_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("account:4", "{not json".into(), ACCOUNT_TTL)
            .await
            .unwrap();
        let cache = cache_with(store);

        let value: Profile = cache
            .read_through("account:4", ACCOUNT_TTL, || async {
                Ok(Profile { name: "fresh".into() })
            })
            .await
            .unwrap();
        assert_eq!(value.name, "fresh");
    }

    #[test]
    fn test_key_naming() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            keys::account(id),
            "account:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(keys::department_notices("R&D"), "notices:department:r&d");
        assert_eq!(keys::rate_limit("10.0.0.1"), "rate_limit:10.0.0.1");
    }
}
