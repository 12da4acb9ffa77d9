use anyhow::{Context, Result};
use sensor_hub::api::create_app;
use sensor_hub::config::ServiceConfig;
use sensor_hub::gateway::RecordGateway;
use sensor_hub::notifier::ChangeNotifier;
use sensor_hub::store::RecordStore;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_hub=info".into()),
        )
        .init();

    info!("Sensor hub starting...");

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    info!(
        bind_addr = %config.server.bind_addr(),
        store_url = %config.store.url,
        "Configuration loaded"
    );

    let store = Arc::new(
        RecordStore::connect(&config.store.url).context("Failed to connect to record store")?,
    );
    let notifier = Arc::new(ChangeNotifier::new());
    let gateway = Arc::new(RecordGateway::new(Arc::clone(&store), notifier));

    let router = create_app(gateway);
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr())
        .await
        .context("Failed to bind HTTP port")?;
    info!(port = config.server.port, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutdown signal received");

    if let Err(e) = store.disconnect() {
        error!(error = ?e, "Failed to disconnect record store");
    }
    info!("Sensor hub stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
}
