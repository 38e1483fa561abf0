//! Recording samples and aggregating trip distance over the history log

use crate::error::{HistoryError, HistoryResult};

use chrono::{DateTime, Utc};
use geotrack_core::{GeoPoint, NewSample, PositionSample, path_length_km};
use geotrack_db::HistoryLog;
use std::sync::Arc;
use tracing::{debug, info};

/// Transport-independent history operations
#[derive(Clone)]
pub struct HistoryService {
    log: Arc<dyn HistoryLog>,
}

impl HistoryService {
    pub fn new(log: Arc<dyn HistoryLog>) -> Self {
        Self { log }
    }

    /// Append a sample stamped with the server's clock
    pub async fn record_location(
        &self,
        username: &str,
        point: GeoPoint,
    ) -> HistoryResult<PositionSample> {
        require_username(username)?;

        let stored = self.log.append(NewSample::new(username, point)).await?;
        info!(
            "Received location update: {} ({}, {}) at {}",
            stored.username, stored.point.latitude, stored.point.longitude, stored.timestamp
        );
        Ok(stored)
    }

    /// Cumulative point-to-point distance travelled in `[start, end]`.
    ///
    /// Each sample adds its distance from the previous one in time order,
    /// so denser sampling of the same route yields a larger total. Zero or
    /// one sample in the window gives 0.
    pub async fn trip_distance(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> HistoryResult<f64> {
        require_username(username)?;

        let points = self.log.query_range(username, start, end).await?;
        let distance = path_length_km(&points);

        debug!(
            "Distance for {} over {} samples between {} and {}: {:.3} km",
            username,
            points.len(),
            start,
            end,
            distance
        );
        Ok(distance)
    }
}

fn require_username(username: &str) -> HistoryResult<()> {
    if username.trim().is_empty() {
        return Err(HistoryError::invalid_argument("username must not be empty"));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
