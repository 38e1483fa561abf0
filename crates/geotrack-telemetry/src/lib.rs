//! # Geotrack Telemetry - Metrics & Observability
//!
//! Prometheus metrics for the location services:
//! - Dual-write outcomes, including history/current divergence
//! - Radius search volume and result sizes
//! - Distance queries and history RPC latency
//! - HTTP request counts and latency

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use tracing::{info, warn};

/// Outcome label values shared by the counters below
pub mod outcome {
    pub const OK: &str = "ok";
    pub const INVALID: &str = "invalid";
    pub const RPC_FAILED: &str = "rpc_failed";
    pub const STORAGE_FAILED: &str = "storage_failed";
    pub const PARTIAL_WRITE: &str = "partial_write";
}

/// Metrics collector for the geotrack services
pub struct MetricsCollector {
    registry: Registry,

    // Write path
    location_updates: IntCounterVec,
    dual_write_divergence: IntCounter,

    // Search
    search_requests: IntCounterVec,
    search_matches: Histogram,
    tracked_users: IntGauge,

    // Distance
    distance_requests: IntCounterVec,

    // History RPC
    rpc_duration: HistogramVec,

    // HTTP
    api_requests_total: IntCounterVec,
    api_request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let location_updates = IntCounterVec::new(
            Opts::new("geotrack_location_updates_total", "Location updates by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(location_updates.clone()))?;

        let dual_write_divergence = IntCounter::new(
            "geotrack_dual_write_divergence_total",
            "Updates recorded in history whose current-position upsert failed",
        )?;
        registry.register(Box::new(dual_write_divergence.clone()))?;

        let search_requests = IntCounterVec::new(
            Opts::new("geotrack_search_requests_total", "Radius searches by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(search_requests.clone()))?;

        let search_matches = Histogram::with_opts(
            HistogramOpts::new(
                "geotrack_search_matches",
                "Users inside the radius per search",
            )
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        )?;
        registry.register(Box::new(search_matches.clone()))?;

        let tracked_users = IntGauge::new(
            "geotrack_tracked_users",
            "Rows in the current-position table at the last scan",
        )?;
        registry.register(Box::new(tracked_users.clone()))?;

        let distance_requests = IntCounterVec::new(
            Opts::new("geotrack_distance_requests_total", "Distance queries by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(distance_requests.clone()))?;

        let rpc_duration = HistogramVec::new(
            HistogramOpts::new(
                "geotrack_history_rpc_duration_seconds",
                "History service call duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )?;
        registry.register(Box::new(rpc_duration.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("geotrack_api_requests_total", "API requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "geotrack_api_request_duration_seconds",
                "API request duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "path"],
        )?;
        registry.register(Box::new(api_request_duration.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            location_updates,
            dual_write_divergence,
            search_requests,
            search_matches,
            tracked_users,
            distance_requests,
            rpc_duration,
            api_requests_total,
            api_request_duration,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    pub fn record_update(&self, outcome: &str) {
        self.location_updates.with_label_values(&[outcome]).inc();
    }

    /// History has the sample but the current-position row does not
    pub fn record_divergence(&self) {
        self.dual_write_divergence.inc();
        self.record_update(outcome::PARTIAL_WRITE);
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    pub fn record_search(&self, scanned: usize, matched: usize) {
        self.search_requests.with_label_values(&[outcome::OK]).inc();
        self.search_matches.observe(matched as f64);
        self.tracked_users.set(scanned as i64);
    }

    /// The current-position scan failed
    pub fn record_search_failure(&self) {
        self.search_requests
            .with_label_values(&[outcome::STORAGE_FAILED])
            .inc();
    }

    // ========================================================================
    // DISTANCE
    // ========================================================================

    pub fn record_distance(&self, outcome: &str) {
        self.distance_requests.with_label_values(&[outcome]).inc();
    }

    // ========================================================================
    // HISTORY RPC
    // ========================================================================

    pub fn record_rpc(&self, method: &str, duration_secs: f64) {
        self.rpc_duration
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    // ========================================================================
    // API METRICS
    // ========================================================================

    /// Record API request
    pub fn record_api_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.api_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.api_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

// ============================================================================
// TESTS
// ============================================================================
