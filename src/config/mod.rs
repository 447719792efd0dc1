use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub shortener: ShortenerConfig,
    pub analytics: AnalyticsConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings consumed by the normalizer and the code generator.
///
/// Injected rather than read from globals so tests can run against
/// arbitrary base URLs and code lengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    /// Public base URL of this deployment, used to build full short URLs
    /// and to reject self-referencing targets.
    pub public_base_url: String,
    pub code_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of worker tasks draining the access-record queue.
    pub workers: usize,
    /// Capacity of the submission queue; accesses beyond it are dropped.
    pub queue_capacity: usize,
    /// Base URL of the geo lookup API.
    pub geo_endpoint: String,
    /// Upper bound on a single geo lookup, so a slow upstream cannot
    /// starve the worker pool.
    pub geo_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub interval_secs: u64,
    /// Expired links are kept around this many days before the sweeper
    /// removes them and their access records.
    pub grace_days: i64,
}

impl ShortenerConfig {
    pub const DEFAULT_CODE_LENGTH: usize = 8;

    /// Full externally-visible short URL for a code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), code)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./stoat.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let code_length = std::env::var("CODE_LENGTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(ShortenerConfig::DEFAULT_CODE_LENGTH);

        let workers = std::env::var("ANALYTICS_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4);
        let queue_capacity = std::env::var("ANALYTICS_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(200);
        let geo_endpoint = std::env::var("GEO_API_URL")
            .unwrap_or_else(|_| "http://ip-api.com/json".to_string());
        let geo_timeout_ms = std::env::var("GEO_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2_000);

        let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(86_400);
        let grace_days = std::env::var("SWEEP_GRACE_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(30);

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            shortener: ShortenerConfig {
                public_base_url,
                code_length,
            },
            analytics: AnalyticsConfig {
                workers,
                queue_capacity,
                geo_endpoint,
                geo_timeout_ms,
            },
            sweep: SweepConfig {
                interval_secs,
                grace_days,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_url_joins_base_and_code() {
        let cfg = ShortenerConfig {
            public_base_url: "https://sho.rt".to_string(),
            code_length: 8,
        };
        assert_eq!(cfg.short_url("a8f3KsQ1"), "https://sho.rt/a8f3KsQ1");

        // Trailing slash on the base must not double up
        let cfg = ShortenerConfig {
            public_base_url: "https://sho.rt/".to_string(),
            code_length: 8,
        };
        assert_eq!(cfg.short_url("abc"), "https://sho.rt/abc");
    }
}
