//! # Geotrack Core
//!
//! Core domain models shared by the location-management and
//! location-history services: usernames, position samples, current
//! positions, validation rules and great-circle math.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod geo;
pub mod validate;

pub use error::{CoreError, CoreResult};
pub use geo::*;

// ============================================================================
// USER MODELS
// ============================================================================

/// Validated user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Parse and validate a username
    pub fn parse(raw: impl Into<String>) -> CoreResult<Self> {
        let raw = raw.into();
        validate::validate_username(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Username::parse(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// POSITION MODELS
// ============================================================================

/// Latest known position of a user; replaced on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPosition {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CurrentPosition {
    pub fn new(username: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            username: username.into(),
            latitude: point.latitude,
            longitude: point.longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// A sample about to be appended to the history log.
///
/// `timestamp` is assigned by the log when left empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub username: String,
    pub point: GeoPoint,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewSample {
    pub fn new(username: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            username: username.into(),
            point,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Immutable history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub username: String,
    pub point: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_parse() {
        let name = Username::parse("alice").unwrap();
        assert_eq!(name.as_str(), "alice");
        assert_eq!(name.to_string(), "alice");
        assert!(Username::parse("ab").is_err());
    }

    #[test]
    fn test_username_deserialize_validates() {
        let ok: Result<Username, _> = serde_json::from_str("\"testuser\"");
        assert!(ok.is_ok());

        let bad: Result<Username, _> = serde_json::from_str("\"no-dashes\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_current_position_json_shape() {
        let pos = CurrentPosition::new("testuser", GeoPoint::new(37.7749, -122.4194));
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["username"], "testuser");
        assert_eq!(json["latitude"], 37.7749);
        assert_eq!(json["longitude"], -122.4194);
    }

    #[test]
    fn test_new_sample_timestamp() {
        let sample = NewSample::new("alice", GeoPoint::new(1.0, 2.0));
        assert!(sample.timestamp.is_none());

        let now = Utc::now();
        let sample = sample.at(now);
        assert_eq!(sample.timestamp, Some(now));
    }
}
