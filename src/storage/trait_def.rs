use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::stats::{StatRow, StatsDimension};
use crate::models::{LinkSortField, NewAccessRecord, ShortLink, SortDirection};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for links and their access records.
///
/// Any transactional store works behind this trait; the crate ships a
/// SQLite backend. Deletes must cascade from a link to its access records.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Insert a new link. Fails with [`StorageError::Conflict`] when the
    /// short code is already assigned.
    async fn create_link(
        &self,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink>;

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>>;

    /// Uniqueness oracle for the code generator.
    async fn code_exists(&self, short_code: &str) -> Result<bool>;

    /// Whether a code is assigned to a link other than `link_id` (the
    /// custom-code check on the update path).
    async fn code_in_use_by_other(&self, short_code: &str, link_id: i64) -> Result<bool>;

    /// Duplicate-target check on the shorten path.
    async fn target_exists(&self, target_url: &str) -> Result<bool>;

    async fn target_in_use_by_other(&self, target_url: &str, link_id: i64) -> Result<bool>;

    /// Rewrite a link's mutable fields and stamp `updated_at`. Fails with
    /// [`StorageError::Conflict`] when the new code collides.
    async fn update_link(
        &self,
        link_id: i64,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink>;

    /// Delete a link and, in the same transaction, its access records.
    async fn delete_link(&self, link_id: i64) -> Result<bool>;

    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        sort: LinkSortField,
        direction: SortDirection,
    ) -> Result<Vec<ShortLink>>;

    async fn count_links(&self) -> Result<i64>;

    /// Total accesses recorded against a link.
    async fn count_accesses(&self, link_id: i64) -> Result<i64>;

    /// Distinct device fingerprints recorded against a link; the quota
    /// check reads this.
    async fn count_distinct_devices(&self, link_id: i64) -> Result<i64>;

    /// Append an access record (timestamped at insert).
    async fn insert_access(&self, record: NewAccessRecord) -> Result<()>;

    /// Delete every link whose expiry is at or before `cutoff`, together
    /// with its access records, in one transaction. Returns the number of
    /// links removed. Idempotent.
    async fn delete_expired_before(&self, cutoff: i64) -> Result<u64>;

    /// One page of grouped access statistics, ordered by access count in
    /// `direction` with ties broken by group value ascending.
    async fn top_stats(
        &self,
        dimension: StatsDimension,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StatRow>>;

    /// Total number of groups for a dimension (for pagination metadata).
    async fn count_stat_groups(&self, dimension: StatsDimension) -> Result<i64>;
}
