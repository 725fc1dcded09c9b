//! Corpora HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use corpora::{ConfigLoader, ConfigManager, QdrantVectorStore, VectorStore, VectorStoreHandle};
use corpora_server::api::{AppState, create_router};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Components get this long to clean up on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; LOG_LEVEL is the simpler knob; default to info.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| {
            tracing_subscriber::EnvFilter::try_new(
                std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            )
        })
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let loader = ConfigLoader::from_environment();
    tracing::info!(path = %loader.path().display(), "loading configuration");
    let manager = Arc::new(ConfigManager::from_loader(loader)?);
    let snapshot = manager.get();

    let addr: SocketAddr = snapshot.api.socket_addr().parse()?;

    let vectors: VectorStoreHandle = Arc::new(QdrantVectorStore::connect(
        &snapshot.vector_store.url,
        snapshot.vector_store.collection_name.clone(),
        snapshot.vector_store.persist_directory.clone(),
    )?);
    vectors.initialize().await?;

    let state = AppState::build(manager, vectors).await?;
    let app = create_router(state.clone());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "corpora serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down components");
    if tokio::time::timeout(SHUTDOWN_GRACE, state.shutdown())
        .await
        .is_err()
    {
        tracing::error!("component cleanup exceeded the grace period, aborting");
    }

    tracing::info!("corpora shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
