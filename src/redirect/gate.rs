//! The redirection decision procedure.

use chrono::Utc;
use std::sync::Arc;

use crate::analytics::recorder::{RecorderHandle, RequesterInfo};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::Storage;

/// Orchestrates lookup, expiry, and device-quota checks for a redirect,
/// then hands the access to the analytics recorder without waiting on it.
///
/// Stateless per call: all state lives in the store, and concurrent
/// resolutions only race on reads. The quota count runs before the
/// recorder's insert lands, so a burst of simultaneous first-time devices
/// can transiently admit more than `access_limit` distinct devices;
/// enforcement is eventual by design.
pub struct RedirectGate {
    storage: Arc<dyn Storage>,
    recorder: RecorderHandle,
}

impl RedirectGate {
    pub fn new(storage: Arc<dyn Storage>, recorder: RecorderHandle) -> Self {
        Self { storage, recorder }
    }

    /// Resolve a short code to its target URL.
    pub async fn resolve(&self, code: &str, requester: RequesterInfo) -> ServiceResult<String> {
        let link = self
            .storage
            .get_link(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Url does not exist.".to_string()))?;

        if let Some(expires_at) = link.expires_at {
            if Utc::now().timestamp() >= expires_at {
                return Err(ServiceError::Gone("Short URL has expired.".to_string()));
            }
        }

        if let Some(limit) = link.access_limit {
            let devices = self.storage.count_distinct_devices(link.id).await?;
            if devices >= limit {
                return Err(ServiceError::QuotaExceeded(format!(
                    "Access denied: this short URL has reached its device limit of {limit}."
                )));
            }
        }

        // Submission failures are logged inside the recorder and must not
        // change the outcome below.
        let target = link.target_url.clone();
        self.recorder.submit(&link, requester);

        Ok(target)
    }
}
