pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};

use commands::{build_router, AppState};
use config::Config;
use services::{Catalog, CodeforcesClient, DatabaseService};

pub async fn run() -> Result<()> {
    let config = Config::load()?;
    logging::init_logging(config.log_level)?;

    info!("Opening database at {}", config.database_path.display());
    let db = DatabaseService::open(&config.database_path)?;

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin()?,
    };
    info!("Loaded {} tracked problems", catalog.len());

    let codeforces = CodeforcesClient::new(&config.codeforces_api_url, config.submission_count)?;

    let address = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        config,
        db,
        catalog,
        codeforces,
    });
    let app = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
