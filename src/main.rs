use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use stoat::analytics::{AnalyticsRecorder, GeoResolver, HttpGeoResolver};
use stoat::api::{self, AppState};
use stoat::config::Config;
use stoat::redirect::{self, RedirectGate};
use stoat::storage::{SqliteStorage, Storage};
use stoat::sweep;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );
    storage.init().await?;
    info!("Database initialized: {}", config.database.url);

    let geo: Arc<dyn GeoResolver> = Arc::new(HttpGeoResolver::new(
        &config.analytics.geo_endpoint,
        Duration::from_millis(config.analytics.geo_timeout_ms),
    )?);

    let recorder = AnalyticsRecorder::spawn(
        config.analytics.workers,
        config.analytics.queue_capacity,
        Arc::clone(&storage),
        geo,
    );
    info!(
        workers = config.analytics.workers,
        queue = config.analytics.queue_capacity,
        "Analytics recorder started"
    );

    let sweeper = sweep::spawn_sweeper(Arc::clone(&storage), config.sweep.clone());

    let gate = RedirectGate::new(Arc::clone(&storage), recorder.handle());
    let api_state = Arc::new(AppState {
        storage: Arc::clone(&storage),
        shortener: config.shortener.clone(),
    });

    let app = api::create_api_router(api_state).merge(redirect::create_redirect_router(gate));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Listening on http://{}", addr);
    info!("   Short URLs served as {}/{{code}}", config.shortener.public_base_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router (and with it the gate's recorder handle) is gone once
    // serve returns, so shutdown drains the remaining analytics backlog.
    sweeper.abort();
    recorder.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");
}
