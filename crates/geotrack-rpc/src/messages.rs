//! Wire messages (prost, standard protobuf encoding)

use chrono::{DateTime, Utc};

/// `UpdateLocation` request
#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationUpdate {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(double, tag = "2")]
    pub latitude: f64,
    #[prost(double, tag = "3")]
    pub longitude: f64,
}

/// Empty acknowledgement for `UpdateLocation`
#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateAck {}

/// `GetDistance` request; both bounds are inclusive
#[derive(Clone, PartialEq, prost::Message)]
pub struct DistanceRequest {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(message, optional, tag = "2")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DistanceResponse {
    /// Kilometers
    #[prost(double, tag = "1")]
    pub distance: f64,
}

pub fn to_timestamp(time: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

/// `None` for timestamps outside chrono's range or with invalid nanos
pub fn from_timestamp(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}
