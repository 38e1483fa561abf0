//! History service configuration

use geotrack_db::{DbConfig, DbResult};

/// History service configuration
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// gRPC listener port
    pub grpc_port: u16,
    /// Storage configuration
    pub db: DbConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            grpc_port: 50051,
            db: DbConfig::default(),
        }
    }
}

impl HistoryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DbResult<Self> {
        dotenvy::dotenv().ok();

        let grpc_port = std::env::var("HISTORY_GRPC_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50051);

        Ok(Self {
            grpc_port,
            db: DbConfig::from_env()?,
        })
    }
}
