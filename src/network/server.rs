use crate::catalog::AnimalCatalog;
use crate::error::AppError;
use crate::network::identify::identify;
use crate::network::upload::UploadStore;
use crate::pipeline::IdentificationPipeline;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<AnimalCatalog>,
    pub pipeline: IdentificationPipeline,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(catalog: AnimalCatalog, pipeline: IdentificationPipeline, uploads: UploadStore) -> Self {
        Self {
            catalog: Arc::new(catalog),
            pipeline,
            uploads: Arc::new(uploads),
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/identify", post(identify))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub struct Server {
    address: SocketAddr,
    router: Router,
}

impl Server {
    pub fn new(address: SocketAddr, router: Router) -> Self {
        Self { address, router }
    }

    /// Serves until Ctrl-C.
    pub async fn start(self) -> Result<(), AppError> {
        let listener = TcpListener::bind(self.address)
            .await
            .map_err(|e| AppError::Bind(e, self.address.to_string()))?;
        info!("Listening on http://{}", self.address);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(AppError::Serve)?;
        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
