//! Validation errors shared by both services

use thiserror::Error;

/// Core error type: input that must be rejected before any store or
/// remote call is touched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid username {username:?}: {reason}")]
    InvalidUsername { username: String, reason: String },

    #[error("Invalid position: latitude={lat}, longitude={lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("Invalid radius: {0} (must be a positive number of kilometers)")]
    InvalidRadius(f64),

    #[error("Invalid paging: {0}")]
    InvalidPage(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

impl CoreError {
    pub fn invalid_username(username: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUsername {
            username: username.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_position(lat: f64, lng: f64) -> Self {
        Self::InvalidPosition { lat, lng }
    }

    pub fn invalid_page(msg: impl Into<String>) -> Self {
        Self::InvalidPage(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
