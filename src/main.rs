use anyhow::{Context, Result};
use filedrop::{AppState, app, config::AppConfig, services::notifier::SocketHub};
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filedrop=info,tower_http=info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting filedrop with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if fs::metadata(&cfg.storage_dir).await.is_err() {
        fs::create_dir_all(&cfg.storage_dir)
            .await
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir.display()))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir.display());
    }

    // --- Initialize shared notifier + state ---
    let hub = Arc::new(SocketHub::new());
    let state = AppState::new(cfg.storage_dir.clone(), hub.clone());

    // --- Build router ---
    let router = app(state, cfg.request_timeout());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C; closes notifier sockets so the server can drain.
async fn shutdown_signal(hub: Arc<SocketHub>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    hub.shutdown();
}
