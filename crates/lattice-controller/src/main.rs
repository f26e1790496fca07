//! latticed entrypoint.

use clap::Parser;
use lattice_api::AppState;
use lattice_core::ports::Storage;
use lattice_scheduler::{Placer, Reaper};
use lattice_store::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::ControllerConfig;

#[derive(Parser)]
#[command(name = "latticed")]
#[command(author, version, about = "Lattice GPU fleet controller", long_about = None)]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address override.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(path) => ControllerConfig::from_file(&path)?,
        None => ControllerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let placer = Placer::new(Arc::clone(&storage), config.placement_interval());
    let placer_handle = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { placer.run(shutdown).await }
    });

    let reaper = Reaper::new(
        Arc::clone(&storage),
        config.reaper_interval(),
        config.agent_missing_after(),
        config.agent_remove_after(),
    );
    let reaper_handle = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { reaper.run(shutdown).await }
    });

    let app = lattice_api::build_app(Arc::new(AppState::new(Arc::clone(&storage))));
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(listen = %config.listen, "controller listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    shutdown_tx.send(true)?;
    let _ = placer_handle.await;
    let _ = reaper_handle.await;
    storage.close().await?;

    Ok(())
}
