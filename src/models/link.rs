use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted mapping from a unique short code to a target URL.
///
/// `target_url` is always stored in canonical form (scheme present,
/// lower-cased host). Timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShortLink {
    pub id: i64,
    pub short_code: String,
    pub target_url: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    /// None = never expires.
    pub expires_at: Option<i64>,
    /// None = unlimited; otherwise the maximum number of distinct
    /// device fingerprints allowed to resolve this link.
    pub access_limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSortField {
    CreatedAt,
    ExpiresAt,
    AccessLimit,
}

impl LinkSortField {
    pub fn column(&self) -> &'static str {
        match self {
            LinkSortField::CreatedAt => "created_at",
            LinkSortField::ExpiresAt => "expires_at",
            LinkSortField::AccessLimit => "access_limit",
        }
    }
}

impl Default for LinkSortField {
    fn default() -> Self {
        LinkSortField::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Desc
    }
}
