//! Generic entity repository.
//!
//! One implementation of create / get / update / soft-delete / paginated list
//! shared by every table that follows the common row layout: a UUID `id`,
//! `created_at`, `updated_at` and a nullable `deleted_at`. Every read filters
//! out soft-deleted rows. Filters and joins specific to a domain are written
//! by the owning service, not here.

use std::marker::PhantomData;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{conflict_on_unique, AppError};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A row type stored in its own table.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    /// Name used in not-found messages.
    const NAME: &'static str;
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    /// A unique violation becomes a `Conflict` carrying `message`; anything
    /// else converts as usual.
    pub fn or_conflict(self, message: &str) -> AppError {
        match self {
            RepoError::Database(e) => conflict_on_unique(e, message),
            other => other.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { entity, .. } => AppError::NotFound(format!("{entity} not found")),
            RepoError::Database(e) => AppError::Database(e),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field values and change sets
// ────────────────────────────────────────────────────────────────────────────

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(Option<i32>),
    SmallInt(Option<i16>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Uuid(Option<Uuid>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
}

macro_rules! field_value_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for FieldValue {
            fn from(v: $ty) -> Self {
                FieldValue::$variant(Some(v.into()))
            }
        }
        impl From<Option<$ty>> for FieldValue {
            fn from(v: Option<$ty>) -> Self {
                FieldValue::$variant(v.map(Into::into))
            }
        }
    };
}

field_value_from!(Text, String);
field_value_from!(Text, &str);
field_value_from!(Int, i32);
field_value_from!(SmallInt, i16);
field_value_from!(Float, f64);
field_value_from!(Bool, bool);
field_value_from!(Uuid, Uuid);
field_value_from!(Date, NaiveDate);
field_value_from!(Timestamp, DateTime<Utc>);

/// Ordered set of `column = value` assignments.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    fields: Vec<(&'static str, FieldValue)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Sets the column only when a value is provided.
    pub fn set_opt<V: Into<FieldValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(c, _)| *c)
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: FieldValue) {
    match value {
        FieldValue::Text(v) => qb.push_bind(v),
        FieldValue::Int(v) => qb.push_bind(v),
        FieldValue::SmallInt(v) => qb.push_bind(v),
        FieldValue::Float(v) => qb.push_bind(v),
        FieldValue::Bool(v) => qb.push_bind(v),
        FieldValue::Uuid(v) => qb.push_bind(v),
        FieldValue::Date(v) => qb.push_bind(v),
        FieldValue::Timestamp(v) => qb.push_bind(v),
    };
}

fn build_insert(table: &str, changes: Changes) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {table} "));
    if changes.is_empty() {
        qb.push("DEFAULT VALUES RETURNING *");
        return qb;
    }

    let columns: Vec<&str> = changes.columns().collect();
    qb.push("(").push(columns.join(", ")).push(") VALUES (");
    for (i, (_, value)) in changes.fields.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }
    qb.push(") RETURNING *");
    qb
}

fn build_update(table: &str, id: Uuid, changes: Changes) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {table} SET "));
    for (column, value) in changes.fields {
        qb.push(column).push(" = ");
        push_value(&mut qb, value);
        qb.push(", ");
    }
    qb.push("updated_at = now() WHERE id = ")
        .push_bind(id)
        .push(" AND deleted_at IS NULL");
    qb
}

// ────────────────────────────────────────────────────────────────────────────
// Pagination
// ────────────────────────────────────────────────────────────────────────────

/// `?page=&pageSize=` (also accepts `page_size` and `size`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    #[serde(rename = "pageSize", alias = "page_size", alias = "size")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    /// Pages are 1-indexed; a missing or non-positive page becomes 1, and a
    /// page size outside `[1, MAX_PAGE_SIZE]` falls back to the default.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl From<PageQuery> for Pagination {
    fn from(q: PageQuery) -> Self {
        Pagination::new(q.page, q.page_size)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Repository
// ────────────────────────────────────────────────────────────────────────────

pub struct Repository<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Constraint violations are returned as-is for the caller to map.
    pub async fn create(&self, fields: Changes) -> Result<T, RepoError> {
        self.create_with(&self.pool, fields).await
    }

    /// Same as `create`, on a caller-supplied connection or transaction.
    pub async fn create_with<'e, E>(&self, executor: E, fields: Changes) -> Result<T, RepoError>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = build_insert(T::TABLE, fields);
        Ok(qb.build_query_as::<T>().fetch_one(executor).await?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<T, RepoError> {
        let sql = format!(
            "SELECT * FROM {} WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound {
                entity: T::NAME,
                id,
            })
    }

    /// Applies only the provided fields. Zero affected rows means the row
    /// does not exist (or is soft-deleted), never a no-op.
    pub async fn update(&self, id: Uuid, changes: Changes) -> Result<(), RepoError> {
        self.update_with(&self.pool, id, changes).await
    }

    pub async fn update_with<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        changes: Changes,
    ) -> Result<(), RepoError>
    where
        E: PgExecutor<'e>,
    {
        let result = build_update(T::TABLE, id, changes)
            .build()
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound {
                entity: T::NAME,
                id,
            });
        }
        Ok(())
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), RepoError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL",
            T::TABLE
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound {
                entity: T::NAME,
                id,
            });
        }
        Ok(())
    }

    /// Physical removal, for entities whose service documents it.
    pub async fn hard_delete(&self, id: Uuid) -> Result<(), RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound {
                entity: T::NAME,
                id,
            });
        }
        Ok(())
    }

    /// Newest first. `total` counts every live row regardless of the window.
    pub async fn list(&self, pagination: Pagination) -> Result<(Vec<T>, i64), RepoError> {
        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE deleted_at IS NULL",
            T::TABLE
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT * FROM {} WHERE deleted_at IS NULL ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            T::TABLE
        );
        let items = sqlx::query_as::<_, T>(&list_sql)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, page_size: 10 });
        assert_eq!(Pagination::new(Some(0), Some(0)).page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(-3), Some(101)), Pagination { page: 1, page_size: 10 });
        assert_eq!(Pagination::new(Some(2), Some(100)), Pagination { page: 2, page_size: 100 });
        assert_eq!(Pagination::new(Some(1), Some(1)).page_size, 1);
    }

    #[test]
    fn test_pagination_offset() {
        assert_eq!(Pagination::new(Some(1), Some(10)).offset(), 0);
        assert_eq!(Pagination::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn test_page_query_aliases() {
        for uri in [
            "/jobs?page=2&pageSize=20",
            "/jobs?page=2&page_size=20",
            "/jobs?page=2&size=20",
        ] {
            let uri: Uri = uri.parse().unwrap();
            let Query(q) = Query::<PageQuery>::try_from_uri(&uri).unwrap();
            assert_eq!(Pagination::from(q), Pagination { page: 2, page_size: 20 });
        }
    }

    #[test]
    fn test_insert_sql_lists_only_given_columns() {
        let changes = Changes::new()
            .set("title", "Backend engineer")
            .set_opt("salary_range", None::<String>)
            .set("status", "open");
        let qb = build_insert("job_postings", changes);
        assert_eq!(
            qb.sql(),
            "INSERT INTO job_postings (title, status) VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn test_insert_without_fields_uses_defaults() {
        let qb = build_insert("roles", Changes::new());
        assert_eq!(qb.sql(), "INSERT INTO roles DEFAULT VALUES RETURNING *");
    }

    #[test]
    fn test_update_sql_filters_deleted_rows() {
        let changes = Changes::new()
            .set("title", "Staff engineer")
            .set("capacity", 30_i32);
        let qb = build_update("training_courses", Uuid::nil(), changes);
        assert_eq!(
            qb.sql(),
            "UPDATE training_courses SET title = $1, capacity = $2, updated_at = now() \
             WHERE id = $3 AND deleted_at IS NULL"
        );
    }

    #[test]
    fn test_empty_update_still_touches_row() {
        let qb = build_update("accounts", Uuid::nil(), Changes::new());
        assert_eq!(
            qb.sql(),
            "UPDATE accounts SET updated_at = now() WHERE id = $1 AND deleted_at IS NULL"
        );
    }

    #[test]
    fn test_repo_not_found_maps_to_app_error() {
        let err: AppError = RepoError::NotFound {
            entity: "Job posting",
            id: Uuid::nil(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Job posting not found"));
        assert!(matches!(
            RepoError::Database(sqlx::Error::RowNotFound).or_conflict("duplicate"),
            AppError::Database(_)
        ));
    }
}

/// Database-backed tests. Run with `cargo test -- --ignored` and a
/// `DATABASE_URL` pointing at a disposable Postgres server.
#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::models::notice::Notice;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_list_on_empty_table_returns_nothing(pool: PgPool) {
        let repo = Repository::<Notice>::new(pool);
        let (items, total) = repo.list(Pagination::new(Some(1), Some(10))).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_soft_deleted_rows_drop_out_of_reads(pool: PgPool) {
        let repo = Repository::<Notice>::new(pool);
        let notice = repo
            .create(
                Changes::new()
                    .set("title", "Holiday")
                    .set("content", "Office closed")
                    .set("scope", "all"),
            )
            .await
            .unwrap();
        assert_eq!(repo.list(Pagination::new(None, None)).await.unwrap().1, 1);

        repo.soft_delete(notice.id).await.unwrap();
        assert!(matches!(
            repo.get_by_id(notice.id).await,
            Err(RepoError::NotFound { .. })
        ));
        assert!(matches!(
            repo.soft_delete(notice.id).await,
            Err(RepoError::NotFound { .. })
        ));
        let (items, total) = repo.list(Pagination::new(None, None)).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }
}
