//! # HTTP Server
//!
//! Combines the record, health and metrics routers behind CORS and request
//! tracing, and serves them until the shutdown signal fires.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::config::HttpServerConfig;
use super::observability_routes::{health_routes, observability_routes};
use super::records_routes::{v1_routes, v2_routes, RecordsState};
use crate::observability::Event;
use crate::service::RecordEngine;

/// HTTP server for the record engine
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, engine: Arc<RecordEngine>) -> Self {
        let router = Self::build_router(&config, engine);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, engine: Arc<RecordEngine>) -> Router {
        let metrics = Arc::clone(engine.metrics());
        let records = RecordsState::new(engine, config.request_timeout());

        Router::new()
            // Health check at root level
            .merge(health_routes())
            .nest("/observability", observability_routes(metrics))
            .nest("/api/v1", v1_routes(records.clone()))
            .nest("/api/v2", v2_routes(records))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(Self::cors_layer(config)),
            )
    }

    fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
        if config.cors_origins.is_empty() {
            return CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
        }

        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn start<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        let addr = listener.local_addr()?;
        info!(event = %Event::Serving, addr = %addr, "listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!(event = %Event::ShutdownComplete, "server stopped");
        Ok(())
    }
}
