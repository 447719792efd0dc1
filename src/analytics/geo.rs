//! IP geolocation via the ip-api.com JSON endpoint.
//!
//! The resolver is infallible from the caller's perspective: loopback and
//! unspecified addresses short-circuit without a network call, and every
//! transport, parse, or rate-limit failure degrades to the Unknown tuple.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: String,
    pub city: String,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
        }
    }
}

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Never fails; degraded lookups return the Unknown tuple.
    async fn lookup(&self, address: &str) -> GeoInfo;
}

pub struct HttpGeoResolver {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    status: String,
    country: Option<String>,
    city: Option<String>,
}

impl HttpGeoResolver {
    /// `timeout` bounds each lookup so a slow upstream cannot starve the
    /// recorder's worker pool.
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, address: &str) -> anyhow::Result<GeoInfo> {
        let url = format!(
            "{}/{}?fields=status,country,city",
            self.endpoint, address
        );
        let response: GeoApiResponse = self.client.get(&url).send().await?.json().await?;

        if response.status != "success" {
            anyhow::bail!("lookup returned status {:?}", response.status);
        }

        Ok(GeoInfo {
            country: response.country.unwrap_or_else(|| UNKNOWN.to_string()),
            city: response.city.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn lookup(&self, address: &str) -> GeoInfo {
        if is_local_address(address) {
            return GeoInfo::unknown();
        }

        match self.fetch(address).await {
            Ok(info) => info,
            Err(err) => {
                warn!(address, error = %err, "geo lookup failed");
                GeoInfo::unknown()
            }
        }
    }
}

/// Literal check for addresses that can never resolve to a location.
fn is_local_address(address: &str) -> bool {
    address == "127.0.0.1"
        || address == "::1"
        || address.starts_with("0.0.0.0")
        || address.starts_with("0:0:0:0")
}
