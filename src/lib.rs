pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod roadmap;
pub mod routes;
pub mod service;

pub use crate::config::AppConfig;
pub use crate::errors::{AppError, AppResult};
pub use crate::routes::build_router;
pub use crate::service::PlannerCore;

use crate::db::Database;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Opens the database, binds the listener and serves until Ctrl-C.
pub async fn run(config: AppConfig) -> AppResult<()> {
    let addr = config.socket_addr()?;
    let db = Arc::new(Database::new(&config.db_path)?);
    let core = Arc::new(PlannerCore::new(db));
    let app = build_router(core);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|error| AppError::Io(format!("Failed to bind {addr}: {error}")))?;
    tracing::info!(%addr, db_path = %config.db_path.display(), "ArtistOS backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Io(format!("Server error: {error}")))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// JSON logs filtered by `RUST_LOG` (default `info`). With a log directory
/// they go to a daily rolling file, otherwise to stdout.
pub fn init_tracing(log_dir: Option<&Path>) -> AppResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let result = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "artistos.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
    };

    result.map_err(|error| AppError::Internal(error.to_string()))
}
