//! photo_blog server
//!
//! Usage:
//!   JWT_SECRET=... cargo run --bin photo_blog
//!   cargo run --bin load_data     # optional demo content

use anyhow::Context;
use tokio::net::TcpListener;

use photo_blog::auth::ClaimSigner;
use photo_blog::config::Config;
use photo_blog::rest::create_router;
use photo_blog::storage::Storage;
use photo_blog::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _log_guard = telemetry::init(&config);
    tracing::info!(?config, "photo_blog starting");

    // One store handle for the whole process, flushed on shutdown.
    let storage = Storage::open(&config.data_dir)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let signer = ClaimSigner::new(config.jwt_secret.as_bytes(), config.session_ttl());

    let app = create_router(storage.clone(), signer);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let flushed = storage.flush()?;
    tracing::info!(bytes = flushed, "Store flushed, shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
