//! API server configuration

use geotrack_db::{DbConfig, DbResult};
use geotrack_rpc::RpcConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST API port
    pub api_port: u16,
    /// History service endpoint and call bounds
    pub rpc: RpcConfig,
    /// Current-position storage
    pub db: DbConfig,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    /// Single origin allowed when not permissive; `None` allows no cross-origin callers
    pub cors_origin: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            rpc: RpcConfig::default(),
            db: DbConfig::default(),
            cors_permissive: true,
            cors_origin: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DbResult<Self> {
        dotenvy::dotenv().ok();

        let api_port = std::env::var("MANAGEMENT_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let cors_permissive = std::env::var("CORS_PERMISSIVE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(true);

        let cors_origin = std::env::var("CORS_ALLOWED_ORIGIN")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            api_port,
            rpc: RpcConfig::from_env(),
            db: DbConfig::from_env()?,
            cors_permissive,
            cors_origin,
        })
    }

    /// Everything in memory, history expected on localhost
    pub fn local() -> Self {
        Self {
            db: DbConfig::memory(),
            ..Default::default()
        }
    }
}
