use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` controls the filter,
/// defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Load `.env` if present. Missing files are fine; real environments set
/// their variables directly.
pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Bind the listener and serve the finished router until shutdown.
pub async fn serve(service_name: &str, app: Router, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("{} listening on {}", service_name, listener.local_addr()?);
    axum::serve(listener, app).await.context("Server exited")?;
    Ok(())
}
