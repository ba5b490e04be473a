use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triclub::api::auth::purge_expired_sessions;
use triclub::api::metrics::init_metrics;
use triclub::api::rate_limit::spawn_cleanup_task;
use triclub::config::Config;
use triclub::AppState;

/// How often expired login sessions are deleted
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "triclub")]
#[command(author, version, about = "Membership and rewards backend for TriClub", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "triclub.toml", env = "TRICLUB_CONFIG")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TriClub v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    // Initialize database
    let db = triclub::db::init(&config.server.data_dir).await?;

    // The admin's personal code is how the first member gets in
    let admin = triclub::db::ensure_admin_user(&db, &config.auth, &config.rewards).await?;
    tracing::info!(
        admin = %admin.email,
        invite_code = %admin.invite_code,
        "Admin account ready"
    );

    let metrics_handle = init_metrics().context("Failed to install metrics recorder")?;
    let state = Arc::new(AppState::new(config.clone(), db.clone()).with_metrics(metrics_handle));

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    let session_db = db.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SESSION_PURGE_INTERVAL).await;
            match purge_expired_sessions(&session_db).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Expired sessions purged"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
            }
        }
    });

    let app = triclub::api::create_router(state);

    let api_addr = format!("{}:{}", config.server.host, config.server.api_port);
    let listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("Failed to bind {}", api_addr))?;

    tracing::info!("API server listening on http://{}", api_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
