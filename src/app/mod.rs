//! The demo HTTP app that runs inside the deployed container.

pub mod handlers;
pub mod routes;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::utils::shutdown_signal;

pub use handlers::AppState;
pub use routes::create_router;

/// Serve the app on all interfaces at `port` until a shutdown signal arrives.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
