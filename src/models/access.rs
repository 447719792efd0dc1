use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Immutable log entry of one resolved access to a [`ShortLink`].
///
/// Created only by the analytics recorder, never updated, and deleted
/// only when the owning link is deleted.
///
/// [`ShortLink`]: super::ShortLink
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessRecord {
    pub id: i64,
    pub link_id: i64,
    /// 64-char hex SHA-256 over (client address, user agent, link id).
    pub device_hash: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: i64,
}

/// Fields supplied when inserting a new access record; id and timestamp
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAccessRecord {
    pub link_id: i64,
    pub device_hash: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}
