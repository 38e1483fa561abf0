//! Current positions, radius search and the dual write into history

use crate::error::{ManagementError, ManagementResult};

use chrono::{DateTime, Utc};
use geotrack_core::validate::{validate_paging, validate_position, validate_radius, validate_username};
use geotrack_core::{CurrentPosition, GeoPoint};
use geotrack_db::CurrentPositionStore;
use geotrack_rpc::{HistoryClient, RpcError};
use geotrack_telemetry::{MetricsCollector, outcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Radius search parameters; `page` is 1-based
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub page: u32,
    pub page_size: u32,
}

/// One page of users inside the search radius
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub users: Vec<CurrentPosition>,
    pub page: u32,
    pub total_pages: usize,
    pub total_users: usize,
}

/// Management operations over the current-position store and the
/// history service
#[derive(Clone)]
pub struct ManagementService {
    store: Arc<dyn CurrentPositionStore>,
    history: Arc<dyn HistoryClient>,
    metrics: Arc<MetricsCollector>,
}

impl ManagementService {
    pub fn new(
        store: Arc<dyn CurrentPositionStore>,
        history: Arc<dyn HistoryClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            history,
            metrics,
        }
    }

    /// Record a position in history, then make it the user's current one.
    ///
    /// The current position is only written after history accepted the
    /// sample. If that second write fails the two stores diverge and the
    /// caller gets [`ManagementError::PartialWrite`].
    pub async fn update_location(&self, username: &str, point: GeoPoint) -> ManagementResult<()> {
        if let Err(e) = validate_username(username).and_then(|_| validate_position(&point)) {
            self.metrics.record_update(outcome::INVALID);
            return Err(e.into());
        }

        let started = Instant::now();
        let recorded = self.history.record_location(username, point).await;
        self.metrics
            .record_rpc("UpdateLocation", started.elapsed().as_secs_f64());

        if let Err(e) = recorded {
            warn!("History rejected update for {}: {}", username, e);
            self.metrics.record_update(rpc_outcome(&e));
            return Err(e.into());
        }

        let position = CurrentPosition::new(username, point);
        if let Err(source) = self.store.upsert(&position).await {
            error!(
                "Location of {} recorded in history but current position update failed: {}",
                username, source
            );
            self.metrics.record_divergence();
            return Err(ManagementError::PartialWrite {
                username: username.to_string(),
                source,
            });
        }

        self.metrics.record_update(outcome::OK);
        info!(
            "Location updated: {} ({}, {})",
            username, point.latitude, point.longitude
        );
        Ok(())
    }

    /// Users within `radius_km` of the center (boundary inclusive),
    /// paginated in store scan order
    pub async fn search_users(&self, query: &SearchQuery) -> ManagementResult<SearchPage> {
        validate_position(&query.center)?;
        validate_radius(query.radius_km)?;
        validate_paging(query.page, query.page_size)?;

        let all = match self.store.scan_all().await {
            Ok(all) => all,
            Err(e) => {
                warn!("Current-position scan failed: {}", e);
                self.metrics.record_search_failure();
                return Err(e.into());
            }
        };
        let scanned = all.len();

        let matches: Vec<CurrentPosition> = all
            .into_iter()
            .filter(|user| query.center.distance_to(&user.point()) <= query.radius_km)
            .collect();

        self.metrics.record_search(scanned, matches.len());
        debug!(
            "Search within {} km of ({}, {}): {} of {} users",
            query.radius_km,
            query.center.latitude,
            query.center.longitude,
            matches.len(),
            scanned
        );

        Ok(paginate(matches, query.page, query.page_size))
    }

    /// Trip distance in kilometers; a missing `end` means now
    pub async fn get_distance(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> ManagementResult<f64> {
        if let Err(e) = validate_username(username) {
            self.metrics.record_distance(outcome::INVALID);
            return Err(e.into());
        }

        let end = end.unwrap_or_else(Utc::now);

        let started = Instant::now();
        let result = self.history.trip_distance(username, start, end).await;
        self.metrics
            .record_rpc("GetDistance", started.elapsed().as_secs_f64());

        match result {
            Ok(distance) => {
                self.metrics.record_distance(outcome::OK);
                Ok(distance)
            }
            Err(e) => {
                warn!("Distance query for {} failed: {}", username, e);
                self.metrics.record_distance(rpc_outcome(&e));
                Err(e.into())
            }
        }
    }

    pub async fn get_user(&self, username: &str) -> ManagementResult<CurrentPosition> {
        validate_username(username)?;

        self.store
            .get(username)
            .await?
            .ok_or_else(|| ManagementError::NotFound(username.to_string()))
    }

    /// Readiness of the current-position store
    pub async fn health_check(&self) -> ManagementResult<()> {
        self.store.health_check().await?;
        Ok(())
    }
}

/// History storage failures are counted apart from transport failures
fn rpc_outcome(err: &RpcError) -> &'static str {
    match err {
        RpcError::RemoteStorage(_) => outcome::STORAGE_FAILED,
        _ => outcome::RPC_FAILED,
    }
}

/// Slice one page out of `items`. Pages past the end are empty but still
/// report the real totals.
pub fn paginate(items: Vec<CurrentPosition>, page: u32, page_size: u32) -> SearchPage {
    let total_users = items.len();
    let size = (page_size as usize).max(1);
    let total_pages = total_users.div_ceil(size);

    let start = (page as usize).saturating_sub(1).saturating_mul(size);
    let users = if start >= total_users {
        Vec::new()
    } else {
        let end = start.saturating_add(size).min(total_users);
        items.into_iter().skip(start).take(end - start).collect()
    };

    SearchPage {
        users,
        page,
        total_pages,
        total_users,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_core::{CoreError, distance_km};
    use geotrack_db::{DbError, MemoryPositionStore, MockCurrentPositionStore};
    use geotrack_rpc::{GrpcHistoryClient, MockHistoryClient, RpcConfig};
    use std::time::Duration;

    fn metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().unwrap())
    }

    fn accepting_history() -> MockHistoryClient {
        let mut history = MockHistoryClient::new();
        history.expect_record_location().returning(|_, _| Ok(()));
        history
    }

    fn service_with(
        store: Arc<dyn CurrentPositionStore>,
        history: impl HistoryClient + 'static,
    ) -> ManagementService {
        ManagementService::new(store, Arc::new(history), metrics())
    }

    fn query(lat: f64, lng: f64, radius_km: f64, page: u32, page_size: u32) -> SearchQuery {
        SearchQuery {
            center: GeoPoint::new(lat, lng),
            radius_km,
            page,
            page_size,
        }
    }

    async fn seeded_store(count: usize) -> Arc<MemoryPositionStore> {
        let store = Arc::new(MemoryPositionStore::new());
        for i in 1..=count {
            let point = GeoPoint::new(10.0 + i as f64 * 0.001, 10.0);
            store
                .upsert(&CurrentPosition::new(format!("user{:02}", i), point))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_update_then_search_finds_user() {
        let store = Arc::new(MemoryPositionStore::new());
        let service = service_with(store.clone(), accepting_history());

        service
            .update_location("alice", GeoPoint::new(37.77, -122.42))
            .await
            .unwrap();

        let page = service
            .search_users(&query(37.77, -122.42, 0.01, 1, 10))
            .await
            .unwrap();
        assert_eq!(page.total_users, 1);
        assert_eq!(page.users[0].username, "alice");
    }

    #[tokio::test]
    async fn test_short_username_rejected_before_any_call() {
        let mut store = MockCurrentPositionStore::new();
        store.expect_upsert().never();
        let mut history = MockHistoryClient::new();
        history.expect_record_location().never();

        let service = service_with(Arc::new(store), history);
        let err = service
            .update_location("ab", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ManagementError::Validation(CoreError::InvalidUsername { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_rejected_before_any_call() {
        let mut store = MockCurrentPositionStore::new();
        store.expect_upsert().never();
        let mut history = MockHistoryClient::new();
        history.expect_record_location().never();

        let service = service_with(Arc::new(store), history);
        let err = service
            .update_location("alice", GeoPoint::new(91.0, 0.0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ManagementError::Validation(CoreError::InvalidPosition { .. })
        ));
    }

    #[tokio::test]
    async fn test_history_unavailable_leaves_store_untouched() {
        let store = Arc::new(MemoryPositionStore::new());
        let mut history = MockHistoryClient::new();
        history
            .expect_record_location()
            .returning(|_, _| Err(RpcError::Unavailable("connection refused".into())));

        let service = service_with(store.clone(), history);
        let err = service
            .update_location("alice", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Rpc(ref e) if e.is_unavailable()));
        assert!(store.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_history_peer_leaves_store_untouched() {
        let store = Arc::new(MemoryPositionStore::new());
        let client = GrpcHistoryClient::new(&RpcConfig {
            port: 1,
            call_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();

        let service = service_with(store.clone(), client);
        let err = service
            .update_location("alice", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Rpc(ref e) if e.is_unavailable()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_is_partial_write() {
        let mut store = MockCurrentPositionStore::new();
        store
            .expect_upsert()
            .times(1)
            .returning(|_| Err(DbError::Query("write timeout".into())));
        let mut history = MockHistoryClient::new();
        history
            .expect_record_location()
            .times(1)
            .returning(|_, _| Ok(()));

        let metrics = metrics();
        let service = ManagementService::new(Arc::new(store), Arc::new(history), metrics.clone());
        let err = service
            .update_location("alice", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();

        match err {
            ManagementError::PartialWrite { username, source } => {
                assert_eq!(username, "alice");
                assert!(matches!(source, DbError::Query(_)));
            }
            other => panic!("expected partial write, got {other:?}"),
        }
        assert!(
            metrics
                .export()
                .contains("geotrack_dual_write_divergence_total 1")
        );
    }

    #[tokio::test]
    async fn test_pagination_last_page_and_past_end() {
        let store = seeded_store(13).await;
        let service = service_with(store, MockHistoryClient::new());

        let page = service
            .search_users(&query(10.0, 10.0, 100.0, 3, 5))
            .await
            .unwrap();
        assert_eq!(page.total_users, 13);
        assert_eq!(page.total_pages, 3);
        let names: Vec<_> = page.users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["user11", "user12", "user13"]);

        let past_end = service
            .search_users(&query(10.0, 10.0, 100.0, 4, 5))
            .await
            .unwrap();
        assert!(past_end.users.is_empty());
        assert_eq!(past_end.page, 4);
        assert_eq!(past_end.total_pages, 3);
        assert_eq!(past_end.total_users, 13);
    }

    #[tokio::test]
    async fn test_huge_page_number_is_empty() {
        let store = seeded_store(3).await;
        let service = service_with(store, MockHistoryClient::new());

        let page = service
            .search_users(&query(10.0, 10.0, 100.0, u32::MAX, u32::MAX))
            .await
            .unwrap();
        assert!(page.users.is_empty());
        assert_eq!(page.total_users, 3);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_search_radius_is_inclusive() {
        let store = Arc::new(MemoryPositionStore::new());
        store
            .upsert(&CurrentPosition::new("edge", GeoPoint::new(0.0, 1.0)))
            .await
            .unwrap();
        store
            .upsert(&CurrentPosition::new("beyond", GeoPoint::new(0.0, 1.5)))
            .await
            .unwrap();
        let service = service_with(store, MockHistoryClient::new());

        let radius = distance_km(0.0, 0.0, 0.0, 1.0);
        let page = service
            .search_users(&query(0.0, 0.0, radius, 1, 10))
            .await
            .unwrap();

        assert_eq!(page.total_users, 1);
        assert_eq!(page.users[0].username, "edge");
        for user in &page.users {
            assert!(GeoPoint::new(0.0, 0.0).distance_to(&user.point()) <= radius);
        }
    }

    #[tokio::test]
    async fn test_search_validates_before_scanning() {
        let mut store = MockCurrentPositionStore::new();
        store.expect_scan_all().never();
        let service = service_with(Arc::new(store), MockHistoryClient::new());

        for bad in [
            query(0.0, 0.0, 0.0, 1, 10),
            query(0.0, 0.0, f64::NAN, 1, 10),
            query(0.0, 0.0, 1.0, 0, 10),
            query(0.0, 0.0, 1.0, 1, 0),
            query(0.0, 181.0, 1.0, 1, 10),
        ] {
            let err = service.search_users(&bad).await.unwrap_err();
            assert!(matches!(err, ManagementError::Validation(_)), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_search_storage_failure_is_recoverable() {
        let mut store = MockCurrentPositionStore::new();
        store
            .expect_scan_all()
            .returning(|| Err(DbError::Connection("no hosts available".into())));
        let metrics = metrics();
        let service = ManagementService::new(
            Arc::new(store),
            Arc::new(MockHistoryClient::new()),
            metrics.clone(),
        );

        let err = service
            .search_users(&query(0.0, 0.0, 1.0, 1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagementError::Storage(_)));
        assert!(metrics.export().contains(
            "geotrack_search_requests_total{outcome=\"storage_failed\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_history_storage_failure_stays_distinct() {
        let store = Arc::new(MemoryPositionStore::new());
        let mut history = MockHistoryClient::new();
        history
            .expect_record_location()
            .returning(|_, _| Err(RpcError::RemoteStorage("Query error: write rejected".into())));

        let metrics = metrics();
        let service = ManagementService::new(store.clone(), Arc::new(history), metrics.clone());
        let err = service
            .update_location("alice", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, ManagementError::Rpc(RpcError::RemoteStorage(_))));
        assert!(store.is_empty());
        assert!(metrics.export().contains(
            "geotrack_location_updates_total{outcome=\"storage_failed\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_get_distance_defaults_end_to_now() {
        let mut history = MockHistoryClient::new();
        history
            .expect_trip_distance()
            .withf(|_, _, end| (Utc::now() - *end).num_seconds().abs() < 5)
            .times(1)
            .returning(|_, _, _| Ok(4.2));
        let service = service_with(Arc::new(MemoryPositionStore::new()), history);

        let start = Utc::now() - chrono::Duration::hours(1);
        let distance = service.get_distance("alice", start, None).await.unwrap();
        assert_eq!(distance, 4.2);
    }

    #[tokio::test]
    async fn test_get_distance_passes_rpc_failure_through() {
        let mut history = MockHistoryClient::new();
        history
            .expect_trip_distance()
            .returning(|_, _, _| Err(RpcError::Timeout(Duration::from_secs(3))));
        let service = service_with(Arc::new(MemoryPositionStore::new()), history);

        let err = service
            .get_distance("alice", Utc::now(), Some(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagementError::Rpc(RpcError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_get_user() {
        let store = Arc::new(MemoryPositionStore::new());
        let service = service_with(store.clone(), accepting_history());

        let err = service.get_user("alice").await.unwrap_err();
        assert!(matches!(err, ManagementError::NotFound(_)));

        service
            .update_location("alice", GeoPoint::new(1.0, 2.0))
            .await
            .unwrap();
        let user = service.get_user("alice").await.unwrap();
        assert_eq!(user.point(), GeoPoint::new(1.0, 2.0));
    }

    #[test]
    fn test_paginate_exact_multiple() {
        let items: Vec<_> = (0..10)
            .map(|i| CurrentPosition::new(format!("user{i:02}"), GeoPoint::default()))
            .collect();

        let page = paginate(items.clone(), 2, 5);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.users, items[5..10].to_vec());

        let empty = paginate(Vec::new(), 1, 5);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.users.is_empty());
    }
}
