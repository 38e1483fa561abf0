//! Append-only location history log

use crate::{DbError, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use geotrack_core::{GeoPoint, NewSample, PositionSample};
use parking_lot::RwLock;
use scylla::Session;
use scylla::frame::value::CqlTimestamp;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Time-ordered log of position samples
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append one immutable sample, stamping it with the current time when
    /// the caller did not supply a timestamp
    async fn append(&self, sample: NewSample) -> DbResult<PositionSample>;

    /// Points recorded for `username` with `start <= timestamp <= end`,
    /// ascending by timestamp. No match yields an empty vector.
    async fn query_range(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<GeoPoint>>;
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// History log held in process memory.
///
/// Samples are kept sorted per user; equal timestamps keep insertion order.
#[derive(Default)]
pub struct MemoryHistoryLog {
    samples: RwLock<HashMap<String, Vec<PositionSample>>>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples stored for a user
    pub fn len_for(&self, username: &str) -> usize {
        self.samples
            .read()
            .get(username)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl HistoryLog for MemoryHistoryLog {
    async fn append(&self, sample: NewSample) -> DbResult<PositionSample> {
        let stored = PositionSample {
            timestamp: sample.timestamp.unwrap_or_else(Utc::now),
            username: sample.username,
            point: sample.point,
        };

        let mut samples = self.samples.write();
        let entries = samples.entry(stored.username.clone()).or_default();
        let idx = entries.partition_point(|s| s.timestamp <= stored.timestamp);
        entries.insert(idx, stored.clone());

        Ok(stored)
    }

    async fn query_range(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<GeoPoint>> {
        let samples = self.samples.read();
        let points = samples
            .get(username)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .map(|s| s.point)
                    .collect()
            })
            .unwrap_or_default();

        Ok(points)
    }
}

// ============================================================================
// SCYLLADB BACKEND
// ============================================================================

/// History log backed by the `location_history` table.
///
/// The partition key is the username and rows cluster by
/// `(recorded_at, sample_id)`, so a range read within one partition comes
/// back already ordered by time. `sample_id` is a server-side `now()`
/// timeuuid, so samples sharing a millisecond keep arrival order.
#[derive(Clone)]
pub struct ScyllaHistoryLog {
    session: Arc<Session>,
    insert_query: String,
    range_query: String,
}

impl ScyllaHistoryLog {
    pub fn new(session: Arc<Session>, keyspace: &str) -> Self {
        Self {
            session,
            insert_query: insert_statement(keyspace),
            range_query: range_statement(keyspace),
        }
    }
}

fn insert_statement(keyspace: &str) -> String {
    format!(
        "INSERT INTO {keyspace}.location_history \
         (username, recorded_at, sample_id, latitude, longitude) VALUES (?, ?, now(), ?, ?)"
    )
}

fn range_statement(keyspace: &str) -> String {
    format!(
        "SELECT latitude, longitude FROM {keyspace}.location_history \
         WHERE username = ? AND recorded_at >= ? AND recorded_at <= ?"
    )
}

#[async_trait]
impl HistoryLog for ScyllaHistoryLog {
    async fn append(&self, sample: NewSample) -> DbResult<PositionSample> {
        let timestamp = sample.timestamp.unwrap_or_else(Utc::now);

        self.session
            .query_unpaged(
                self.insert_query.as_str(),
                (
                    sample.username.as_str(),
                    CqlTimestamp(timestamp.timestamp_millis()),
                    sample.point.latitude,
                    sample.point.longitude,
                ),
            )
            .await
            .map_err(|e| DbError::query(e.to_string()))?;

        debug!("Appended history sample for {}", sample.username);

        // The column stores millisecond precision
        let timestamp = DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp);

        Ok(PositionSample {
            username: sample.username,
            point: sample.point,
            timestamp,
        })
    }

    async fn query_range(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<GeoPoint>> {
        if start > end {
            return Ok(Vec::new());
        }

        let rows = self
            .session
            .query_iter(
                self.range_query.as_str(),
                (
                    username,
                    CqlTimestamp(start.timestamp_millis()),
                    CqlTimestamp(end.timestamp_millis()),
                ),
            )
            .await
            .map_err(|e| DbError::query(e.to_string()))?
            .rows_stream::<(f64, f64)>()
            .map_err(|e| DbError::deserialization(e.to_string()))?;

        let points: Vec<GeoPoint> = rows
            .map_ok(GeoPoint::from)
            .try_collect()
            .await
            .map_err(|e| DbError::query(e.to_string()))?;

        Ok(points)
    }
}

// ============================================================================
// TESTS
// ============================================================================
