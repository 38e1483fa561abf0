//! Latest-position-per-user table

use crate::{DbError, DbResult};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::TryStreamExt;
use geotrack_core::CurrentPosition;
use scylla::Session;
use std::sync::Arc;
use tracing::{debug, warn};

/// Store holding exactly one row per user
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait CurrentPositionStore: Send + Sync {
    /// Insert or replace the row for `position.username` (last writer wins)
    async fn upsert(&self, position: &CurrentPosition) -> DbResult<()>;

    /// Every stored row, unfiltered. Filtering is the caller's job.
    async fn scan_all(&self) -> DbResult<Vec<CurrentPosition>>;

    /// Row for a single user
    async fn get(&self, username: &str) -> DbResult<Option<CurrentPosition>>;

    /// Whether the backing store answers at all
    async fn health_check(&self) -> DbResult<()>;
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Position table held in process memory
#[derive(Default)]
pub struct MemoryPositionStore {
    positions: DashMap<String, CurrentPosition>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[async_trait]
impl CurrentPositionStore for MemoryPositionStore {
    async fn upsert(&self, position: &CurrentPosition) -> DbResult<()> {
        self.positions
            .insert(position.username.clone(), position.clone());
        Ok(())
    }

    async fn scan_all(&self) -> DbResult<Vec<CurrentPosition>> {
        let mut rows: Vec<CurrentPosition> =
            self.positions.iter().map(|r| r.value().clone()).collect();
        // DashMap iteration order is arbitrary; sort so pages are stable
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(rows)
    }

    async fn get(&self, username: &str) -> DbResult<Option<CurrentPosition>> {
        Ok(self.positions.get(username).map(|r| r.value().clone()))
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

// ============================================================================
// SCYLLADB BACKEND
// ============================================================================

/// Position table backed by `user_locations`
#[derive(Clone)]
pub struct ScyllaPositionStore {
    session: Arc<Session>,
    upsert_query: String,
    scan_query: String,
    get_query: String,
}

impl ScyllaPositionStore {
    pub fn new(session: Arc<Session>, keyspace: &str) -> Self {
        Self {
            session,
            // INSERT in CQL always overwrites the row with the same key
            upsert_query: format!(
                "INSERT INTO {keyspace}.user_locations (username, latitude, longitude) VALUES (?, ?, ?)"
            ),
            scan_query: format!("SELECT username, latitude, longitude FROM {keyspace}.user_locations"),
            get_query: format!(
                "SELECT username, latitude, longitude FROM {keyspace}.user_locations WHERE username = ?"
            ),
        }
    }
}

#[async_trait]
impl CurrentPositionStore for ScyllaPositionStore {
    async fn upsert(&self, position: &CurrentPosition) -> DbResult<()> {
        self.session
            .query_unpaged(
                self.upsert_query.as_str(),
                (
                    position.username.as_str(),
                    position.latitude,
                    position.longitude,
                ),
            )
            .await
            .map_err(|e| DbError::query(e.to_string()))?;

        debug!("Upserted current position for {}", position.username);
        Ok(())
    }

    async fn scan_all(&self) -> DbResult<Vec<CurrentPosition>> {
        let rows = self
            .session
            .query_iter(self.scan_query.as_str(), &[])
            .await
            .map_err(|e| DbError::query(e.to_string()))?
            .rows_stream::<(String, f64, f64)>()
            .map_err(|e| DbError::deserialization(e.to_string()))?;

        rows.map_ok(|(username, latitude, longitude)| CurrentPosition {
            username,
            latitude,
            longitude,
        })
        .try_collect()
        .await
        .map_err(|e| DbError::query(e.to_string()))
    }

    async fn get(&self, username: &str) -> DbResult<Option<CurrentPosition>> {
        let result = self
            .session
            .query_unpaged(self.get_query.as_str(), (username,))
            .await
            .map_err(|e| DbError::query(e.to_string()))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| DbError::deserialization(e.to_string()))?;

        let row = rows_result
            .maybe_first_row::<(String, f64, f64)>()
            .map_err(|e| DbError::deserialization(e.to_string()))?;

        Ok(row.map(|(username, latitude, longitude)| CurrentPosition {
            username,
            latitude,
            longitude,
        }))
    }

    async fn health_check(&self) -> DbResult<()> {
        self.session
            .query_unpaged("SELECT now() FROM system.local", &[])
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("Database health check failed: {}", e);
                DbError::Connection(e.to_string())
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================
