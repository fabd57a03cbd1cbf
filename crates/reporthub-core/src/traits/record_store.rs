//! Keyed record store trait with upsert semantics.

use async_trait::async_trait;

use crate::result::AppResult;

/// Predicate applied by [`RecordStore::list`].
pub type RecordFilter<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

/// Durable, queryable repository of records keyed by `Id`.
///
/// Only single-record atomicity is required: a reader never observes a
/// partially written record, but there are no multi-record transactions.
/// Implementations live in `reporthub-store`.
#[async_trait]
pub trait RecordStore<R, Id>: Send + Sync + std::fmt::Debug + 'static
where
    R: Send + Sync + 'static,
    Id: Send + Sync + 'static,
{
    /// Insert or replace the record stored under its id.
    async fn put(&self, record: &R) -> AppResult<()>;

    /// Fetch a record by id.
    async fn get(&self, id: &Id) -> AppResult<Option<R>>;

    /// List records, optionally restricted to those matching `filter`.
    async fn list(&self, filter: Option<RecordFilter<'_, R>>) -> AppResult<Vec<R>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
