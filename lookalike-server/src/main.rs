//! Lookalike Server - HTTP API for reverse image lookup
//!
//! Exposes lookalike-core matching via HTTP endpoints:
//! - POST /upload - Look up an image in the reference corpus
//! - GET /our_images/{filename} - Serve a reference image
//! - GET /health, GET /ready - Monitoring

use std::net::SocketAddr;

use lookalike_server::{create_router_with_state, open_store, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("lookalike_server=info,lookalike_core=info,tower_http=info")
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store = open_store(&config).await?;
    let state = AppState::new(store.clone(), config.clone());

    if config.reference_dir.is_dir() {
        match state.index.sync(&config.reference_dir).await {
            Ok(report) => tracing::info!(
                folder = %config.reference_dir.display(),
                scanned = report.scanned,
                inserted = report.inserted,
                duplicates = report.duplicates,
                skipped = report.skipped.len(),
                "Reference corpus synced"
            ),
            Err(e) => tracing::error!(error = %e, "Reference corpus sync failed"),
        }
    } else {
        tracing::warn!(
            folder = %config.reference_dir.display(),
            "Reference folder not found, serving existing corpus only"
        );
    }

    let app = create_router_with_state(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Lookalike server v{} listening on http://{}",
        env!("CARGO_PKG_VERSION"),
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
