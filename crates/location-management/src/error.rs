//! Service and API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use geotrack_core::CoreError;
use geotrack_db::DbError;
use geotrack_rpc::RpcError;
use serde::Serialize;
use thiserror::Error;
use tonic::Code;

/// Failures of the management operations
#[derive(Error, Debug)]
pub enum ManagementError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// History recorded the sample, the current-position upsert failed.
    /// Not rolled back; retrying the update converges both stores.
    #[error("location of {username} recorded in history but not in current positions: {source}")]
    PartialWrite { username: String, source: DbError },
}

pub type ManagementResult<T> = Result<T, ManagementError>;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Partial write: {0}")]
    PartialWrite(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg),
            ApiError::PartialWrite(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "partial_write", msg),
        };

        let body = Json(ErrorResponse {
            error: error_type.into(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<ManagementError> for ApiError {
    fn from(err: ManagementError) -> Self {
        let message = err.to_string();
        match err {
            ManagementError::Validation(_) => ApiError::Validation(message),
            ManagementError::NotFound(_) => ApiError::NotFound(message),
            ManagementError::Storage(_) => ApiError::Storage(message),
            ManagementError::PartialWrite { .. } => ApiError::PartialWrite(message),
            ManagementError::Rpc(RpcError::RemoteStorage(_)) => ApiError::Storage(message),
            ManagementError::Rpc(rpc) if rpc.is_unavailable() => {
                ApiError::ServiceUnavailable(message)
            }
            ManagementError::Rpc(rpc) => match rpc.code() {
                Some(Code::InvalidArgument) => ApiError::BadRequest(message),
                Some(_) => ApiError::BadGateway(message),
                None => ApiError::Internal(message),
            },
        }
    }
}
