//! Fire-and-forget access recording on a bounded worker pool.
//!
//! The redirect gate submits an [`AccessTask`] through [`RecorderHandle`];
//! `try_send` into a bounded mpsc channel means submission never blocks the
//! gate. When the queue is full the newest task is dropped and a warning
//! logged — analytics is best-effort by contract. Workers fingerprint the
//! requester, run the geo lookup, and persist the access record; any
//! failure along the way is logged and swallowed.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::analytics::geo::GeoResolver;
use crate::models::{NewAccessRecord, ShortLink};
use crate::storage::Storage;

pub const MAX_REFERRER_LEN: usize = 2048;
pub const MAX_USER_AGENT_LEN: usize = 512;

/// Request metadata captured on the redirect path.
#[derive(Debug, Clone, Default)]
pub struct RequesterInfo {
    /// Direct peer address.
    pub remote_addr: String,
    /// Raw X-Forwarded-For header value, if any.
    pub forwarded_for: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl RequesterInfo {
    /// First forwarded-for entry when present and non-blank, else the peer.
    pub fn client_address(&self) -> &str {
        if let Some(forwarded) = &self.forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first;
                }
            }
        }
        &self.remote_addr
    }
}

/// Pseudo-device identifier: lowercase hex SHA-256 over the client address,
/// user agent, and link id.
pub fn device_fingerprint(address: &str, user_agent: Option<&str>, link_id: i64) -> String {
    let raw = format!("{}|{}|{}", address, user_agent.unwrap_or(""), link_id);
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[derive(Debug)]
struct AccessTask {
    link: ShortLink,
    requester: RequesterInfo,
}

/// Cloneable submission side of the recorder. Dropping every handle closes
/// the channel; workers drain the backlog and exit.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<AccessTask>,
}

impl RecorderHandle {
    /// Submit an access for recording. Never blocks; a full (or closed)
    /// queue drops the task.
    pub fn submit(&self, link: &ShortLink, requester: RequesterInfo) {
        let task = AccessTask {
            link: link.clone(),
            requester,
        };
        if self.tx.try_send(task).is_err() {
            warn!(
                short_code = %link.short_code,
                "analytics queue full, dropping access record"
            );
        }
    }
}

pub struct AnalyticsRecorder {
    handle: RecorderHandle,
    workers: Vec<JoinHandle<()>>,
}

impl AnalyticsRecorder {
    /// Spawn `workers` tasks draining a queue of `queue_capacity`.
    pub fn spawn(
        workers: usize,
        queue_capacity: usize,
        storage: Arc<dyn Storage>,
        geo: Arc<dyn GeoResolver>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                let storage = Arc::clone(&storage);
                let geo = Arc::clone(&geo);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only for the receive, not the work
                        let task = { rx.lock().await.recv().await };
                        match task {
                            Some(task) => process(task, storage.as_ref(), geo.as_ref()).await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self {
            handle: RecorderHandle { tx },
            workers,
        }
    }

    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    /// Close the queue and wait for the workers to drain it. Only takes
    /// effect once every cloned [`RecorderHandle`] has been dropped.
    pub async fn shutdown(self) {
        drop(self.handle);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn process(task: AccessTask, storage: &dyn Storage, geo: &dyn GeoResolver) {
    let address = task.requester.client_address().to_string();
    let device_hash = device_fingerprint(&address, task.requester.user_agent.as_deref(), task.link.id);

    let geo_info = geo.lookup(&address).await;

    let record = NewAccessRecord {
        link_id: task.link.id,
        device_hash,
        country: Some(geo_info.country),
        city: Some(geo_info.city),
        referrer: task.requester.referrer.map(|r| truncate(r, MAX_REFERRER_LEN)),
        user_agent: task
            .requester
            .user_agent
            .map(|ua| truncate(ua, MAX_USER_AGENT_LEN)),
    };

    if let Err(err) = storage.insert_access(record).await {
        error!(
            link_id = task.link.id,
            error = %err,
            "failed to persist access record"
        );
    }
}

fn truncate(mut value: String, max: usize) -> String {
    if value.len() > max {
        let mut end = max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}
