//! gRPC transport for the history service

use crate::service::HistoryService;

use chrono::Utc;
use geotrack_core::GeoPoint;
use geotrack_rpc::messages::from_timestamp;
use geotrack_rpc::{
    DistanceRequest, DistanceResponse, LocationHistory, LocationHistoryServer, LocationUpdate,
    UpdateAck,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// Implements the generated `LocationHistory` trait on top of
/// [`HistoryService`]
#[derive(Clone)]
pub struct LocationHistoryHandler {
    service: Arc<HistoryService>,
}

impl LocationHistoryHandler {
    pub fn new(service: Arc<HistoryService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl LocationHistory for LocationHistoryHandler {
    async fn update_location(
        &self,
        request: Request<LocationUpdate>,
    ) -> Result<Response<UpdateAck>, Status> {
        let req = request.into_inner();

        self.service
            .record_location(&req.username, GeoPoint::new(req.latitude, req.longitude))
            .await?;

        Ok(Response::new(UpdateAck {}))
    }

    async fn get_distance(
        &self,
        request: Request<DistanceRequest>,
    ) -> Result<Response<DistanceResponse>, Status> {
        let req = request.into_inner();

        let start = req
            .start_time
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("start_time is required"))
            .and_then(|ts| {
                from_timestamp(ts).ok_or_else(|| Status::invalid_argument("start_time is out of range"))
            })?;

        let end = match req.end_time.as_ref() {
            Some(ts) => from_timestamp(ts)
                .ok_or_else(|| Status::invalid_argument("end_time is out of range"))?,
            None => Utc::now(),
        };

        let distance = self
            .service
            .trip_distance(&req.username, start, end)
            .await?;

        Ok(Response::new(DistanceResponse { distance }))
    }
}

/// Create a `LocationHistoryServer` from a shared service
pub fn grpc_server(service: Arc<HistoryService>) -> LocationHistoryServer<LocationHistoryHandler> {
    LocationHistoryServer::new(LocationHistoryHandler::new(service))
}

/// Serve the history RPCs and the gRPC health service on an already bound
/// listener until `shutdown` resolves
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    service: Arc<HistoryService>,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()>,
{
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<LocationHistoryServer<LocationHistoryHandler>>()
        .await;

    tonic::transport::Server::builder()
        .add_service(health_service)
        .add_service(grpc_server(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use geotrack_core::{NewSample, distance_km};
    use geotrack_db::{DbError, HistoryLog, MemoryHistoryLog, MockHistoryLog};
    use geotrack_rpc::messages::to_timestamp;
    use geotrack_rpc::{GrpcHistoryClient, HistoryClient, RpcConfig, RpcError};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tonic::Code;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, hour, 0, 0).unwrap()
    }

    fn handler(log: Arc<MemoryHistoryLog>) -> LocationHistoryHandler {
        LocationHistoryHandler::new(Arc::new(HistoryService::new(log)))
    }

    #[tokio::test]
    async fn test_update_location_appends() {
        let log = Arc::new(MemoryHistoryLog::new());
        let handler = handler(log.clone());

        handler
            .update_location(Request::new(LocationUpdate {
                username: "testuser".into(),
                latitude: 37.7749,
                longitude: -122.4194,
            }))
            .await
            .unwrap();

        assert_eq!(log.len_for("testuser"), 1);
    }

    #[tokio::test]
    async fn test_update_location_empty_username_is_invalid_argument() {
        let handler = handler(Arc::new(MemoryHistoryLog::new()));

        let status = handler
            .update_location(Request::new(LocationUpdate {
                username: String::new(),
                latitude: 1.0,
                longitude: 1.0,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_distance_requires_start_time() {
        let handler = handler(Arc::new(MemoryHistoryLog::new()));

        let status = handler
            .get_distance(Request::new(DistanceRequest {
                username: "testuser".into(),
                start_time: None,
                end_time: Some(to_timestamp(t(1))),
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_distance_defaults_end_time_to_now() {
        let log = Arc::new(MemoryHistoryLog::new());
        log.append(NewSample::new("testuser", GeoPoint::new(0.0, 0.0)).at(t(1)))
            .await
            .unwrap();
        log.append(NewSample::new("testuser", GeoPoint::new(0.0, 1.0)).at(t(2)))
            .await
            .unwrap();
        let handler = handler(log);

        let response = handler
            .get_distance(Request::new(DistanceRequest {
                username: "testuser".into(),
                start_time: Some(to_timestamp(t(0))),
                end_time: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!((response.distance - distance_km(0.0, 0.0, 0.0, 1.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let log = Arc::new(MemoryHistoryLog::new());
        let service = Arc::new(HistoryService::new(log.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_with_listener(listener, service, async {
            let _ = stop_rx.await;
        }));

        let client = GrpcHistoryClient::new(&RpcConfig {
            port,
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();

        client
            .record_location("testuser", GeoPoint::new(10.0, 10.0))
            .await
            .unwrap();
        client
            .record_location("testuser", GeoPoint::new(10.0, 10.5))
            .await
            .unwrap();
        assert_eq!(log.len_for("testuser"), 2);

        let start = Utc::now() - chrono::Duration::hours(1);
        let distance = client
            .trip_distance("testuser", start, Utc::now())
            .await
            .unwrap();
        assert!((distance - distance_km(10.0, 10.0, 10.0, 10.5)).abs() < 1e-9);

        let err = client
            .record_location("", GeoPoint::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Rejected {
                code: Code::InvalidArgument,
                ..
            }
        ));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_reaches_client_as_storage_error() {
        let mut log = MockHistoryLog::new();
        log.expect_append()
            .returning(|_| Err(DbError::Query("write rejected".into())));
        log.expect_query_range()
            .returning(|_, _, _| Err(DbError::Timeout("read timed out".into())));
        let service = Arc::new(HistoryService::new(Arc::new(log)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_with_listener(listener, service, async {
            let _ = stop_rx.await;
        }));

        let client = GrpcHistoryClient::new(&RpcConfig {
            port,
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();

        let err = client
            .record_location("testuser", GeoPoint::new(1.0, 1.0))
            .await
            .unwrap_err();
        assert!(!err.is_unavailable());
        assert!(matches!(err, RpcError::RemoteStorage(ref msg) if msg.contains("write rejected")));

        let err = client
            .trip_distance("testuser", t(0), t(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::RemoteStorage(_)));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
