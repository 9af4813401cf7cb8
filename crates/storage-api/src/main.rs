//! storage-gateway - self-hosted multi-tenant file vault HTTP server.

use clap::Parser;
use storage_api::{run_server, AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::parse();

    let log_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("storage_api={log_level},tower_http=info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(port = config.port, storage_path = %config.file_storage_path, "starting storage-gateway");
    if config.public_registration {
        tracing::warn!("PUBLIC_REGISTRATION is enabled - anyone can self-register");
    }

    run_server(config).await
}
