//! Server startup and graceful shutdown.

use crate::{routes, AppConfig, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Build state and router, bind, and serve until a shutdown signal arrives.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config).await?);
    let app = routes::create_router(state.clone());

    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("storage-gateway listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("storage-gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
