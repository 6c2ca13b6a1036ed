//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{get_resource, health_check, put_resource},
    signal::shutdown_signal,
    store::RoomStore,
};

/// Room backend server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(Arc::new(RoomStore::new(Arc::new(SystemClock))));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    store: Arc<RoomStore>,
}

impl Server {
    pub fn new(store: Arc<RoomStore>) -> Self {
        Self { store }
    }

    /// Routes of the backend, without a listener
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/{room}/{resource}", get(get_resource).put(put_resource))
            .layer(TraceLayer::new_for_http())
            .with_state(self.store.clone())
    }

    /// Bind to `host:port` and serve until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Room server listening on {}", listener.local_addr()?);
        tracing::info!("Rooms at: http://{}/<room>/.json", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    /// Serve on an already bound listener until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }
}
