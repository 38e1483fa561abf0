//! # Location History
//!
//! gRPC service that appends every position update to a time-ordered log
//! and answers "how far did this user travel between two instants".

pub mod config;
pub mod error;
pub mod grpc;
pub mod service;

pub use config::HistoryConfig;
pub use error::{HistoryError, HistoryResult};
pub use grpc::{LocationHistoryHandler, grpc_server, serve_with_listener};
pub use service::HistoryService;
