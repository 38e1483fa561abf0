//! Client side of the history RPC surface

use crate::error::{RpcError, RpcResult};
use crate::messages::{DistanceRequest, LocationUpdate, to_timestamp};
use crate::location_history_client::LocationHistoryClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geotrack_core::GeoPoint;
use std::future::Future;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

/// Operations management needs from the history service.
///
/// The gRPC client implements it; tests substitute a mock.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Record one sample; the history service stamps the time
    async fn record_location(&self, username: &str, point: GeoPoint) -> RpcResult<()>;

    /// Cumulative travel distance in kilometers over `[start, end]`
    async fn trip_distance(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RpcResult<f64>;
}

/// Where and how to reach the history service
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single call, connection included
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            call_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl RpcConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HISTORY_HOST").unwrap_or(defaults.host);

        let port = std::env::var("HISTORY_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let call_timeout = std::env::var("HISTORY_RPC_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.call_timeout);

        let connect_timeout = std::env::var("HISTORY_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_timeout);

        Self {
            host,
            port,
            call_timeout,
            connect_timeout,
        }
    }

    pub fn uri(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// tonic-backed [`HistoryClient`].
///
/// The channel connects lazily, so management starts even while the
/// history service is down; each call then fails with `Unavailable`.
#[derive(Clone)]
pub struct GrpcHistoryClient {
    inner: LocationHistoryClient<Channel>,
    call_timeout: Duration,
}

impl GrpcHistoryClient {
    pub fn new(config: &RpcConfig) -> RpcResult<Self> {
        let endpoint = Endpoint::from_shared(config.uri())
            .map_err(|e| RpcError::Endpoint(e.to_string()))?
            .connect_timeout(config.connect_timeout)
            .timeout(config.call_timeout);

        debug!("History service endpoint: {}", config.uri());

        Ok(Self::from_channel(endpoint.connect_lazy(), config.call_timeout))
    }

    pub fn from_channel(channel: Channel, call_timeout: Duration) -> Self {
        Self {
            inner: LocationHistoryClient::new(channel),
            call_timeout,
        }
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.call_timeout);
        request
    }

    async fn bounded<F, T>(&self, call: F) -> RpcResult<T>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => {
                warn!("History RPC failed: {}", status);
                Err(status.into())
            }
            Err(_) => {
                warn!("History RPC timed out after {:?}", self.call_timeout);
                Err(RpcError::Timeout(self.call_timeout))
            }
        }
    }
}

#[async_trait]
impl HistoryClient for GrpcHistoryClient {
    async fn record_location(&self, username: &str, point: GeoPoint) -> RpcResult<()> {
        let mut client = self.inner.clone();
        let request = self.request(LocationUpdate {
            username: username.to_string(),
            latitude: point.latitude,
            longitude: point.longitude,
        });

        self.bounded(client.update_location(request)).await?;
        Ok(())
    }

    async fn trip_distance(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RpcResult<f64> {
        let mut client = self.inner.clone();
        let request = self.request(DistanceRequest {
            username: username.to_string(),
            start_time: Some(to_timestamp(start)),
            end_time: Some(to_timestamp(end)),
        });

        let response = self.bounded(client.get_distance(request)).await?;
        Ok(response.distance)
    }
}
