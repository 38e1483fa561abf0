//! Application state management

use crate::config::ApiConfig;
use crate::service::ManagementService;

use geotrack_db::{CurrentPositionStore, open_position_store};
use geotrack_rpc::{GrpcHistoryClient, HistoryClient};
use geotrack_telemetry::MetricsCollector;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Dual write, search and distance operations
    pub service: Arc<ManagementService>,
    /// Prometheus metrics
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Open the store and the history channel described by `config`
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = open_position_store(&config.db).await?;
        info!("Current-position store ready ({:?})", config.db.backend);

        let history = GrpcHistoryClient::new(&config.rpc)?;
        info!("History client configured for {}", config.rpc.uri());

        let metrics = Arc::new(MetricsCollector::new()?);

        Ok(Self::from_parts(config, store, Arc::new(history), metrics))
    }

    /// Assemble state from already constructed collaborators
    pub fn from_parts(
        config: ApiConfig,
        store: Arc<dyn CurrentPositionStore>,
        history: Arc<dyn HistoryClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let service = Arc::new(ManagementService::new(store, history, metrics.clone()));
        Self {
            config,
            service,
            metrics,
        }
    }
}
