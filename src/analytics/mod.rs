//! Best-effort access analytics.
//!
//! Everything in this module runs off the redirect's critical path: the
//! gate hands a task to the recorder and returns immediately. Failures
//! here are logged and swallowed, never surfaced to the client.

pub mod geo;
pub mod recorder;
pub mod stats;

pub use geo::{GeoInfo, GeoResolver, HttpGeoResolver};
pub use recorder::{device_fingerprint, AnalyticsRecorder, RecorderHandle, RequesterInfo};
pub use stats::{top_stats, StatRow, StatsDimension, StatsPage};
