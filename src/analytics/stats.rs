//! Grouped access statistics over persisted records.
//!
//! The SQL lives in the storage layer; this module owns the dimension
//! vocabulary, pagination bounds, and the by-code expansion into full
//! short URLs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::ShortenerConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::SortDirection;
use crate::storage::Storage;

pub const MAX_PAGE_SIZE: i64 = 100;

/// Grouping dimension for access statistics. Rows with a NULL value for
/// the chosen field are excluded; `code` and `day` have no NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsDimension {
    Code,
    Country,
    City,
    Referrer,
    UserAgent,
    Day,
}

/// One aggregation group: the raw (or, for `code`, expanded) value, how
/// many accesses it saw, and how many distinct devices produced them.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatRow {
    pub value: String,
    pub access_count: i64,
    pub distinct_devices: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsPage {
    pub items: Vec<StatRow>,
    pub page: i64,
    pub size: i64,
    pub total_groups: i64,
}

/// Compute one page of grouped statistics, sorted by access count in the
/// requested direction with ties broken by group value ascending.
pub async fn top_stats(
    storage: &dyn Storage,
    shortener: &ShortenerConfig,
    dimension: StatsDimension,
    page: i64,
    size: i64,
    direction: SortDirection,
) -> ServiceResult<StatsPage> {
    if page < 0 {
        return Err(ServiceError::Validation(
            "Page must not be negative.".to_string(),
        ));
    }
    if size < 1 || size > MAX_PAGE_SIZE {
        return Err(ServiceError::Validation(format!(
            "Page size must be between 1 and {MAX_PAGE_SIZE}."
        )));
    }

    let mut items = storage
        .top_stats(dimension, direction, size, page * size)
        .await?;

    if dimension == StatsDimension::Code {
        for row in &mut items {
            row.value = shortener.short_url(&row.value);
        }
    }

    let total_groups = storage.count_stat_groups(dimension).await?;

    Ok(StatsPage {
        items,
        page,
        size,
        total_groups,
    })
}
