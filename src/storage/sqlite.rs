use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

use crate::analytics::stats::{StatRow, StatsDimension};
use crate::models::{LinkSortField, NewAccessRecord, ShortLink, SortDirection};
use crate::storage::{Storage, StorageError, StorageResult};

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

const LINK_COLUMNS: &str =
    "id, short_code, target_url, created_at, updated_at, expires_at, access_limit";

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn fetch_by_id(&self, link_id: i64) -> Result<ShortLink> {
        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = ?"
        ))
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(link)
    }
}

/// Grouping expression and NULL filter per dimension. `code` joins through
/// the owning link; `day` buckets the unix timestamp into calendar dates.
fn dimension_sql(dimension: StatsDimension) -> (&'static str, &'static str) {
    match dimension {
        StatsDimension::Code => ("l.short_code", ""),
        StatsDimension::Country => ("r.country", "WHERE r.country IS NOT NULL"),
        StatsDimension::City => ("r.city", "WHERE r.city IS NOT NULL"),
        StatsDimension::Referrer => ("r.referrer", "WHERE r.referrer IS NOT NULL"),
        StatsDimension::UserAgent => ("r.user_agent", "WHERE r.user_agent IS NOT NULL"),
        StatsDimension::Day => ("date(r.timestamp, 'unixepoch')", ""),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL UNIQUE,
                target_url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER,
                expires_at INTEGER,
                access_limit INTEGER
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS access_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                device_hash TEXT NOT NULL,
                country TEXT,
                city TEXT,
                referrer TEXT,
                user_agent TEXT,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_target_url ON links(target_url)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_expires_at ON links(expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        // Quota counting reads COUNT(DISTINCT device_hash) per link
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_link_device ON access_records(link_id, device_hash)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink> {
        let created_at = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO links (short_code, target_url, created_at, expires_at, access_limit)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(short_code)
        .bind(target_url)
        .bind(created_at)
        .bind(expires_at)
        .bind(access_limit)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn code_exists(&self, short_code: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE short_code = ?",
        )
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn code_in_use_by_other(&self, short_code: &str, link_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE short_code = ? AND id != ?",
        )
        .bind(short_code)
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn target_exists(&self, target_url: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE target_url = ?",
        )
        .bind(target_url)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn target_in_use_by_other(&self, target_url: &str, link_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE target_url = ? AND id != ?",
        )
        .bind(target_url)
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn update_link(
        &self,
        link_id: i64,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink> {
        let updated_at = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE links
            SET short_code = ?, target_url = ?, expires_at = ?, access_limit = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(short_code)
        .bind(target_url)
        .bind(expires_at)
        .bind(access_limit)
        .bind(updated_at)
        .bind(link_id)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            _ => StorageError::Other(e.into()),
        })?;

        self.fetch_by_id(link_id)
            .await
            .map_err(StorageError::Other)
    }

    async fn delete_link(&self, link_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM access_records WHERE link_id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        sort: LinkSortField,
        direction: SortDirection,
    ) -> Result<Vec<ShortLink>> {
        // Sort column and direction come from closed enums, not user input
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM links ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            sort.column(),
            direction.sql()
        );

        let links = sqlx::query_as::<_, ShortLink>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(links)
    }

    async fn count_links(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn count_accesses(&self, link_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM access_records WHERE link_id = ?",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn count_distinct_devices(&self, link_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT device_hash) FROM access_records WHERE link_id = ?",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn insert_access(&self, record: NewAccessRecord) -> Result<()> {
        let timestamp = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO access_records
                (link_id, device_hash, country, city, referrer, user_agent, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.link_id)
        .bind(&record.device_hash)
        .bind(&record.country)
        .bind(&record.city)
        .bind(&record.referrer)
        .bind(&record.user_agent)
        .bind(timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete_expired_before(&self, cutoff: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM access_records
            WHERE link_id IN (
                SELECT id FROM links
                WHERE expires_at IS NOT NULL AND expires_at <= ?
            )
            "#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let result =
            sqlx::query("DELETE FROM links WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(cutoff)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn top_stats(
        &self,
        dimension: StatsDimension,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StatRow>> {
        let (value_expr, filter) = dimension_sql(dimension);

        let sql = format!(
            r#"
            SELECT {value_expr} AS value,
                   COUNT(r.id) AS access_count,
                   COUNT(DISTINCT r.device_hash) AS distinct_devices
            FROM access_records r
            JOIN links l ON l.id = r.link_id
            {filter}
            GROUP BY value
            ORDER BY access_count {}, value ASC
            LIMIT ? OFFSET ?
            "#,
            direction.sql()
        );

        let rows = sqlx::query_as::<_, StatRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn count_stat_groups(&self, dimension: StatsDimension) -> Result<i64> {
        let (value_expr, filter) = dimension_sql(dimension);

        let sql = format!(
            r#"
            SELECT COUNT(*) FROM (
                SELECT {value_expr} AS value
                FROM access_records r
                JOIN links l ON l.id = r.link_id
                {filter}
                GROUP BY value
            )
            "#
        );

        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
