//! History service error types

use geotrack_db::DbError;
use geotrack_rpc::storage_status;
use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] DbError),
}

impl HistoryError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<HistoryError> for Status {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidArgument(msg) => Status::invalid_argument(msg),
            HistoryError::Storage(e) => storage_status(e.to_string()),
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;
