//! # HTTP Server Module
//!
//! Axum front end for the record engine.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/v1/*` - Current-state record API
//! - `/api/v2/*` - Versioned record API with time travel
//! - `/observability/*` - Metrics and monitoring

pub mod config;
pub mod errors;
pub mod observability_routes;
pub mod records_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use records_routes::RecordsState;
pub use server::HttpServer;
