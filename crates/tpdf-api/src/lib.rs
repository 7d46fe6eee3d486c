//! Axum HTTP API server.
//!
//! Consumes the orchestration core: creates jobs, publishes them into the
//! pipeline, serves polling/status/result endpoints, and manages the
//! anonymous session cookie and job ownership.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
