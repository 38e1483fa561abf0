//! # Location Management
//!
//! REST API holding each user's current position. Updates are written to
//! the location-history service first and then to the current-position
//! store; radius searches scan the store, trip distances are delegated to
//! history.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ManagementError, ManagementResult};
pub use routes::create_router;
pub use service::{ManagementService, SearchPage, SearchQuery, paginate};
pub use state::AppState;

// ============================================================================
// TESTS
// ============================================================================
