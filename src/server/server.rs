use std::error::Error;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::inference::QaEngine;
use super::routes;

/// API Server for handling model inference requests
pub struct ApiServer {
    engine: Arc<QaEngine>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Wraps an already loaded engine; asset loading happens before the
    /// server exists, so the service can never accept traffic with
    /// partially loaded assets.
    pub fn new(engine: QaEngine, host: String, port: u16) -> Self {
        info!("Creating new API server on {}:{}", host, port);
        Self {
            engine: Arc::new(engine),
            host,
            port,
        }
    }

    pub async fn start(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app_state = Arc::clone(&self.engine);

        // The browser frontend is served from a different origin.
        let app = Router::new()
            .route("/", get(routes::service_status))
            .route("/predict", post(routes::predict))
            .layer(CorsLayer::permissive())
            .with_state(app_state);

        info!("Starting server on {}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;

        info!("Server started successfully\n");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
