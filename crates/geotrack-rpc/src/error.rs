//! Error types for calls to the history service

use std::time::Duration;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::{Code, Status};

/// Trailer naming the server-side failure class of a non-OK status
pub const ERROR_KIND_KEY: &str = "x-geotrack-error-kind";

/// Value of [`ERROR_KIND_KEY`] for failures of the history store
pub const ERROR_KIND_STORAGE: &str = "storage";

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Peer unreachable, connection refused or dropped mid-call
    #[error("history service unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured call timeout
    #[error("history service call timed out after {0:?}")]
    Timeout(Duration),

    /// The peer was reached but its own storage failed
    #[error("history storage failed: {0}")]
    RemoteStorage(String),

    /// The peer answered with a non-OK status
    #[error("history service rejected the call ({code:?}): {message}")]
    Rejected { code: Code, message: String },

    /// The endpoint URI could not be built
    #[error("invalid history endpoint: {0}")]
    Endpoint(String),
}

impl RpcError {
    /// True when the failure means "the peer could not be reached in time"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RpcError::Unavailable(_) | RpcError::Timeout(_))
    }

    pub fn code(&self) -> Option<Code> {
        match self {
            RpcError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Status returned by the history server when its store fails.
///
/// Carries `INTERNAL` plus the storage marker so clients can tell it
/// apart from an unreachable peer.
pub fn storage_status(message: impl Into<String>) -> Status {
    let mut status = Status::internal(message);
    status
        .metadata_mut()
        .insert(ERROR_KIND_KEY, MetadataValue::from_static(ERROR_KIND_STORAGE));
    status
}

fn is_storage_failure(status: &Status) -> bool {
    status
        .metadata()
        .get(ERROR_KIND_KEY)
        .and_then(|kind| kind.to_str().ok())
        .is_some_and(|kind| kind == ERROR_KIND_STORAGE)
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        if is_storage_failure(&status) {
            return RpcError::RemoteStorage(status.message().to_string());
        }

        match status.code() {
            // Connection failures on a lazy channel surface as UNAVAILABLE,
            // channel-level deadlines as CANCELLED or DEADLINE_EXCEEDED
            Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                RpcError::Unavailable(status.message().to_string())
            }
            Code::Unknown if is_transport_failure(&status) => {
                RpcError::Unavailable(status.message().to_string())
            }
            code => RpcError::Rejected {
                code,
                message: status.message().to_string(),
            },
        }
    }
}

fn is_transport_failure(status: &Status) -> bool {
    std::error::Error::source(status)
        .is_some_and(|source| source.downcast_ref::<tonic::transport::Error>().is_some())
}
