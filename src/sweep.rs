//! Periodic cleanup of expired links.
//!
//! Links whose expiry passed more than `grace_days` ago are deleted along
//! with their access records in one transaction per sweep. The job is
//! idempotent and safe to run against live traffic: a redirect racing the
//! sweep on a just-deleted link sees NotFound on its next lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::storage::Storage;

pub fn spawn_sweeper(storage: Arc<dyn Storage>, config: SweepConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        // Skip the immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let cutoff = Utc::now().timestamp() - config.grace_days * 86_400;
            match storage.delete_expired_before(cutoff).await {
                Ok(0) => debug!("no expired links to sweep"),
                Ok(deleted) => info!(deleted, "expired link sweep finished"),
                Err(err) => warn!(error = %err, "expired link sweep failed"),
            }
        }
    })
}
