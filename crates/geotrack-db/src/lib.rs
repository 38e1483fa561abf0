//! # Geotrack DB
//!
//! Persistence layer for current user positions and the append-only
//! location history. Each store is a trait with a ScyllaDB backend for
//! deployments and an in-memory backend for local runs and tests.

pub mod error;
pub mod history;
pub mod migrations;
pub mod positions;

pub use error::{DbError, DbResult};
pub use history::{HistoryLog, MemoryHistoryLog, ScyllaHistoryLog};
pub use positions::{CurrentPositionStore, MemoryPositionStore, ScyllaPositionStore};

#[cfg(any(test, feature = "mocks"))]
pub use history::MockHistoryLog;
#[cfg(any(test, feature = "mocks"))]
pub use positions::MockCurrentPositionStore;

use scylla::transport::ExecutionProfile;
use scylla::{Session, SessionBuilder};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Which storage engine backs the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory; data is lost on restart
    Memory,
    /// ScyllaDB / Cassandra cluster
    Scylla,
}

impl FromStr for StorageBackend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "scylla" | "scylladb" | "cassandra" => Ok(Self::Scylla),
            other => Err(DbError::Configuration(format!(
                "unknown storage backend {other:?} (expected \"memory\" or \"scylla\")"
            ))),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: StorageBackend,
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u32,
    pub connection_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Scylla,
            hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "geotrack".to_string(),
            replication_factor: 1,
            connection_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    pub fn from_env() -> DbResult<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.backend,
        };

        let hosts = std::env::var("SCYLLA_HOSTS")
            .map(|s| {
                s.split(',')
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.hosts);

        let keyspace = std::env::var("SCYLLA_KEYSPACE").unwrap_or(defaults.keyspace);
        if !is_valid_keyspace(&keyspace) {
            return Err(DbError::Configuration(format!(
                "invalid keyspace name {keyspace:?}"
            )));
        }

        let replication_factor = std::env::var("SCYLLA_REPLICATION_FACTOR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.replication_factor);

        let query_timeout = std::env::var("SCYLLA_QUERY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.query_timeout);

        Ok(Self {
            backend,
            hosts,
            keyspace,
            replication_factor,
            query_timeout,
            ..defaults
        })
    }

    /// In-memory configuration for local runs
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Default::default()
        }
    }
}

/// Keyspace names are interpolated into CQL, so only identifiers pass
fn is_valid_keyspace(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 48
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Connected ScyllaDB session plus the keyspace the stores live in
pub struct DbClient {
    session: Arc<Session>,
    config: DbConfig,
}

impl DbClient {
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!("Connecting to ScyllaDB cluster: {:?}", config.hosts);

        let profile = ExecutionProfile::builder()
            .request_timeout(Some(config.query_timeout))
            .build();

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(config.connection_timeout)
            .default_execution_profile_handle(profile.into_handle())
            .build()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        info!("Connected to ScyllaDB");

        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    pub fn keyspace(&self) -> &str {
        &self.config.keyspace
    }

    pub fn history_log(&self) -> ScyllaHistoryLog {
        ScyllaHistoryLog::new(self.session.clone(), &self.config.keyspace)
    }

    pub fn positions(&self) -> ScyllaPositionStore {
        ScyllaPositionStore::new(self.session.clone(), &self.config.keyspace)
    }

    pub async fn health_check(&self) -> DbResult<bool> {
        let result = self
            .session
            .query_unpaged("SELECT now() FROM system.local", &[])
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Database health check failed: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_all(
            &self.session,
            &self.config.keyspace,
            self.config.replication_factor,
        )
        .await
    }
}

/// Open the history log selected by `config`, running migrations first
/// when the backend is ScyllaDB
pub async fn open_history_log(config: &DbConfig) -> DbResult<Arc<dyn HistoryLog>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory history log");
            Ok(Arc::new(MemoryHistoryLog::new()))
        }
        StorageBackend::Scylla => {
            let client = DbClient::new(config.clone()).await?;
            client.run_migrations().await?;
            Ok(Arc::new(client.history_log()))
        }
    }
}

/// Open the current-position store selected by `config`, running
/// migrations first when the backend is ScyllaDB
pub async fn open_position_store(config: &DbConfig) -> DbResult<Arc<dyn CurrentPositionStore>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory position store");
            Ok(Arc::new(MemoryPositionStore::new()))
        }
        StorageBackend::Scylla => {
            let client = DbClient::new(config.clone()).await?;
            client.run_migrations().await?;
            Ok(Arc::new(client.positions()))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
