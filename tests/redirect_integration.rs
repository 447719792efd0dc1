//! End-to-end redirect tests: routing, the expiry and quota checks, and the
//! fire-and-forget analytics path behind the redirect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use tower::{Layer, ServiceExt};

use stoat::analytics::{
    device_fingerprint, AnalyticsRecorder, GeoInfo, GeoResolver, StatsDimension,
};
use stoat::models::{LinkSortField, NewAccessRecord, ShortLink, SortDirection};
use stoat::redirect::{create_redirect_router, RedirectGate};
use stoat::storage::{SqliteStorage, Storage, StorageResult};

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Geo resolver returning a fixed location, no network involved.
struct FakeGeoResolver {
    info: GeoInfo,
}

#[async_trait]
impl GeoResolver for FakeGeoResolver {
    async fn lookup(&self, _address: &str) -> GeoInfo {
        self.info.clone()
    }
}

fn fake_geo(country: &str, city: &str) -> Arc<dyn GeoResolver> {
    Arc::new(FakeGeoResolver {
        info: GeoInfo {
            country: country.to_string(),
            city: city.to_string(),
        },
    })
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

fn build_app(storage: Arc<dyn Storage>, geo: Arc<dyn GeoResolver>) -> (Router, AnalyticsRecorder) {
    let recorder = AnalyticsRecorder::spawn(2, 32, Arc::clone(&storage), geo);
    let gate = RedirectGate::new(storage, recorder.handle());
    let app = create_redirect_router(gate).layer(TestConnectInfoLayer);
    (app, recorder)
}

async fn wait_for_accesses(storage: &dyn Storage, link_id: i64, expected: i64) {
    for _ in 0..100 {
        if storage.count_accesses(link_id).await.unwrap() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {expected} access record(s)");
}

#[tokio::test]
async fn redirect_returns_302_and_records_the_access() {
    let storage = create_test_storage().await;
    let link = storage
        .create_link("hit302", "https://example.com/landing", None, None)
        .await
        .unwrap();
    let (app, _recorder) = build_app(Arc::clone(&storage), fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/hit302")
        .header("x-forwarded-for", "203.0.113.9")
        .header("user-agent", "TestAgent/1.0")
        .header("referer", "https://referrer.example/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com/landing"
    );

    // The record lands asynchronously, geo enrichment included
    wait_for_accesses(storage.as_ref(), link.id, 1).await;
    let countries = storage
        .top_stats(StatsDimension::Country, SortDirection::Desc, 10, 0)
        .await
        .unwrap();
    assert_eq!(countries.len(), 1);
    assert_eq!(countries[0].value, "Testland");
    assert_eq!(countries[0].access_count, 1);
    assert_eq!(countries[0].distinct_devices, 1);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let storage = create_test_storage().await;
    let (app, _recorder) = build_app(storage, fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/nonexistent")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_link_is_gone_and_not_recorded() {
    let storage = create_test_storage().await;
    let past = Utc::now().timestamp() - 60;
    let link = storage
        .create_link("expired", "https://example.com/old", Some(past), None)
        .await
        .unwrap();
    let (app, _recorder) = build_app(Arc::clone(&storage), fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/expired")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(storage.count_accesses(link.id).await.unwrap(), 0);
}

#[tokio::test]
async fn future_expiry_still_redirects() {
    let storage = create_test_storage().await;
    let future = Utc::now().timestamp() + 3600;
    storage
        .create_link("notyet", "https://example.com/live", Some(future), None)
        .await
        .unwrap();
    let (app, _recorder) = build_app(storage, fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/notyet")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn device_quota_blocks_once_reached() {
    let storage = create_test_storage().await;
    let link = storage
        .create_link("limited", "https://example.com/vip", None, Some(1))
        .await
        .unwrap();

    // One distinct device already on record fills the limit; any further
    // device is refused.
    storage
        .insert_access(NewAccessRecord {
            link_id: link.id,
            device_hash: device_fingerprint("198.51.100.7", Some("FirstAgent/1.0"), link.id),
            country: None,
            city: None,
            referrer: None,
            user_agent: Some("FirstAgent/1.0".to_string()),
        })
        .await
        .unwrap();

    let (app, _recorder) = build_app(Arc::clone(&storage), fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/limited")
        .header("x-forwarded-for", "203.0.113.50")
        .header("user-agent", "SecondAgent/2.0")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(storage.count_accesses(link.id).await.unwrap(), 1);
}

#[tokio::test]
async fn quota_admits_devices_below_the_limit() {
    let storage = create_test_storage().await;
    storage
        .create_link("roomy", "https://example.com/open", None, Some(2))
        .await
        .unwrap();

    let (app, _recorder) = build_app(storage, fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/roomy")
        .header("x-forwarded-for", "203.0.113.60")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
}

/// Delegating store whose `insert_access` always fails, to prove a broken
/// analytics write never surfaces on the redirect.
struct FailingRecordStorage {
    inner: Arc<dyn Storage>,
}

#[async_trait]
impl Storage for FailingRecordStorage {
    async fn init(&self) -> anyhow::Result<()> {
        self.inner.init().await
    }

    async fn create_link(
        &self,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink> {
        self.inner
            .create_link(short_code, target_url, expires_at, access_limit)
            .await
    }

    async fn get_link(&self, short_code: &str) -> anyhow::Result<Option<ShortLink>> {
        self.inner.get_link(short_code).await
    }

    async fn code_exists(&self, short_code: &str) -> anyhow::Result<bool> {
        self.inner.code_exists(short_code).await
    }

    async fn code_in_use_by_other(&self, short_code: &str, link_id: i64) -> anyhow::Result<bool> {
        self.inner.code_in_use_by_other(short_code, link_id).await
    }

    async fn target_exists(&self, target_url: &str) -> anyhow::Result<bool> {
        self.inner.target_exists(target_url).await
    }

    async fn target_in_use_by_other(&self, target_url: &str, link_id: i64) -> anyhow::Result<bool> {
        self.inner.target_in_use_by_other(target_url, link_id).await
    }

    async fn update_link(
        &self,
        link_id: i64,
        short_code: &str,
        target_url: &str,
        expires_at: Option<i64>,
        access_limit: Option<i64>,
    ) -> StorageResult<ShortLink> {
        self.inner
            .update_link(link_id, short_code, target_url, expires_at, access_limit)
            .await
    }

    async fn delete_link(&self, link_id: i64) -> anyhow::Result<bool> {
        self.inner.delete_link(link_id).await
    }

    async fn list_links(
        &self,
        limit: i64,
        offset: i64,
        sort: LinkSortField,
        direction: SortDirection,
    ) -> anyhow::Result<Vec<ShortLink>> {
        self.inner.list_links(limit, offset, sort, direction).await
    }

    async fn count_links(&self) -> anyhow::Result<i64> {
        self.inner.count_links().await
    }

    async fn count_accesses(&self, link_id: i64) -> anyhow::Result<i64> {
        self.inner.count_accesses(link_id).await
    }

    async fn count_distinct_devices(&self, link_id: i64) -> anyhow::Result<i64> {
        self.inner.count_distinct_devices(link_id).await
    }

    async fn insert_access(&self, _record: NewAccessRecord) -> anyhow::Result<()> {
        anyhow::bail!("record store unavailable")
    }

    async fn delete_expired_before(&self, cutoff: i64) -> anyhow::Result<u64> {
        self.inner.delete_expired_before(cutoff).await
    }

    async fn top_stats(
        &self,
        dimension: StatsDimension,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<stoat::analytics::StatRow>> {
        self.inner.top_stats(dimension, direction, limit, offset).await
    }

    async fn count_stat_groups(&self, dimension: StatsDimension) -> anyhow::Result<i64> {
        self.inner.count_stat_groups(dimension).await
    }
}

#[tokio::test]
async fn failed_record_insert_does_not_affect_the_redirect() {
    let inner = create_test_storage().await;
    inner
        .create_link("sturdy", "https://example.com/resilient", None, None)
        .await
        .unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FailingRecordStorage {
        inner: Arc::clone(&inner),
    });

    let (app, _recorder) = build_app(storage, fake_geo("Testland", "Faketown"));

    let request = Request::builder()
        .uri("/sturdy")
        .header("x-forwarded-for", "203.0.113.70")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com/resilient"
    );
}
