use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::error::Error;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app;
use crate::auth;
use crate::cfg;
use crate::core;
use crate::services;

/// Application-level error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigLoadingFailed(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    DatabaseOperationFailed(#[from] core::DbError),

    #[error("Migration error: {0}")]
    MigrationFailed(#[from] app::MigrationError),

    #[error("JWT secret error: {0}")]
    JwtSecretUnavailable(#[from] auth::JwtError),

    #[error("CLI error: {0}")]
    CliOperationFailed(#[from] app::CliError),

    #[error("Network address parsing error: {0}")]
    AddressParsingFailed(#[from] std::net::AddrParseError),

    #[error("Server error: {0}")]
    ServerStartingFailed(#[from] std::io::Error),
}

pub async fn create_db_context(settings: &cfg::DatabaseSettings) -> Result<core::DbContext, core::DbError> {
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        // Increase SQLite busy timeout to handle concurrent connections better
        .busy_timeout(Duration::from_secs(30));
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections.min(settings.max_connections))
        .max_lifetime(Duration::from_secs(settings.max_lifetime))
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run() {
    if let Err(e) = run_app().await {
        eprintln!("❌ {e}\n");

        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("Caused by: {err}");
            source = err.source();
        }

        std::process::exit(1);
    }
}

async fn run_app() -> Result<(), AppError> {
    let settings = cfg::AppSettings::new()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.server.log_directives))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // initialize database, signer and run CLI
    let db = create_db_context(&settings.database).await?;
    let secret = auth::get_jwt_secret(&settings.jwt)?;
    let jwt = auth::JwtContext::new(&settings.jwt, &secret);
    let context = core::Context::new(db, jwt, settings);
    if app::run_cli(&context).await? {
        context.db.close().await;
        return Ok(());
    }
    app::run_migrations(&context.db).await?;

    let cleanup = spawn_token_cleanup(context.clone());

    let settings = &context.settings;
    let server_address = settings.get_server_address();
    let address = server_address.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("🚀 starting server");
    tracing::info!("   service: {} v{}", settings.server.name, settings.server.version);
    tracing::info!("   app_env: {}", cfg::AppSettings::get_app_run_env());
    tracing::info!("   cfg_dir: {}", cfg::AppSettings::get_config_full_path());
    tracing::info!("   logging: {}", settings.server.log_directives);
    tracing::info!("   address: http://{server_address}");

    let shutdown_timeout = Duration::from_secs(settings.server.shutdown_timeout);
    let router = app::create_router(context.clone());
    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server.into_future() => result?,
        () = drain_deadline(shutdown_timeout) => {
            tracing::warn!(timeout_secs = shutdown_timeout.as_secs(), "Shutdown timeout elapsed, dropping open connections");
        }
    }

    if let Some(handle) = cleanup {
        handle.abort();
    }
    context.db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves `timeout` after a shutdown signal, bounding how long in-flight requests may drain.
async fn drain_deadline(timeout: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(timeout).await;
}

/// Periodically purges expired and revoked refresh tokens; disabled when the interval is 0.
fn spawn_token_cleanup(context: core::ArcContext) -> Option<tokio::task::JoinHandle<()>> {
    let interval = context.settings.jwt.cleanup_interval;
    if interval == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match services::auth::cleanup_tokens(&context).await {
                Ok(removed) => tracing::debug!(removed, "Refresh token cleanup finished"),
                Err(e) => tracing::error!(error_message = %e, "Refresh token cleanup failed"),
            }
        }
    }))
}

/// Waits for CTRL+C or SIGTERM.
/// We use this in our `Server` method `with_graceful_shutdown`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, shutting down gracefully");
}
