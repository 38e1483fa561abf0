//! # Geotrack RPC
//!
//! gRPC contract between location-management (client) and
//! location-history (server). Uses tonic for transport and prost for
//! message encoding (standard protobuf wire format, no `.proto` file).
//!
//! ## RPCs (`geotrack.history.LocationHistory`)
//!
//! - `UpdateLocation(LocationUpdate) -> UpdateAck`
//! - `GetDistance(DistanceRequest) -> DistanceResponse`

pub mod client;
pub mod error;
pub mod messages;

include!(concat!(
    env!("OUT_DIR"),
    "/geotrack.history.LocationHistory.rs"
));

pub use client::{GrpcHistoryClient, HistoryClient, RpcConfig};
#[cfg(any(test, feature = "mocks"))]
pub use client::MockHistoryClient;
pub use error::{RpcError, RpcResult, storage_status};
pub use location_history_client::LocationHistoryClient;
pub use location_history_server::{LocationHistory, LocationHistoryServer};
pub use messages::{DistanceRequest, DistanceResponse, LocationUpdate, UpdateAck};
