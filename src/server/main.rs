use std::net::SocketAddr;

use pizzeria::config::{get_config, load_env_file};
use pizzeria::database::Database;
use pizzeria::errors::{PizzeriaError, PizzeriaResult};
use pizzeria::migrations::MigrationManager;
use pizzeria::server::logging::init_tracing;
use pizzeria::server::{build_router, AppState};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> PizzeriaResult<()> {
    let env_loaded = load_env_file(None)?;

    let config = get_config()?;
    init_tracing(&config.logging.level);

    if !env_loaded {
        info!("No .env file found, using process environment");
    }

    let db = Database::connect(&config.database).await?;
    db.ping().await?;
    info!(backend = db.backend_name(), "Database connection established");

    if config.server.migrate_on_start {
        let manager = MigrationManager::new(db.clone(), config.migrations_dir());
        let report = manager.run_migrations().await?;
        for failure in &report.errors {
            error!(migration = %failure.migration, error = %failure.error, "Migration failed");
        }
        if !report.is_success() {
            return Err(PizzeriaError::MigrationError(format!(
                "{} migration(s) failed on startup",
                report.errors.len()
            )));
        }
        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            "Migrations applied"
        );
    }

    let state = AppState::new(db, config)?;
    let app = build_router(state, &config.cors)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| PizzeriaError::ConfigError(format!("invalid listen address: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    info!("Pizzeria API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
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
