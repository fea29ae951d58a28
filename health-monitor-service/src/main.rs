//! # Health Monitor Service Binary
//!
//! The process entry point: loads configuration, connects to Postgres and
//! Redis, starts the four supervised monitoring loops, and serves the
//! read-only HTTP surface until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Basic usage with default configuration
//! health-monitor-service
//!
//! # Custom configuration file and worker identity
//! health-monitor-service --config my-config.toml --worker-id worker-2
//!
//! # Debug logging
//! health-monitor-service --log-level debug
//! ```
//!
//! ## Command Line Arguments
//!
//! - `--config, -c`: Path to configuration file (default: config.toml)
//! - `--worker-id`: This process's identity for worker-lease coordination
//!   (default: a generated `host:pid` string)
//! - `--log-level`: Logging level (default: info)
//!
//! ## Health Check
//!
//! Once started, the server exposes `/health` for liveness and
//! `/health/summary` for a live tracking-store snapshot.

use clap::Parser;
use health_monitor_service::config::Config;
use health_monitor_service::server::{build_app_state, create_server};
use std::net::SocketAddr;

/// Command line arguments for the health monitor service.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// This process's worker identity, used by the worker-lease
    /// coordination mechanism (§4.2) to tell instances apart. Defaults to
    /// `hostname:pid`, which is unique enough for a single deployment but
    /// not guaranteed globally unique; set it explicitly in a multi-host
    /// fleet.
    #[arg(long)]
    worker_id: Option<String>,

    /// Logging level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{host}:{}", std::process::id())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(&args.log_level).init();

    let config = Config::load(&args.config)?;
    config.validate()?;

    // Held for the process lifetime: dropping it flushes pending events.
    // `SentryAlertSink::emit` is a no-op without this client initialized.
    let _sentry_guard = config.alert.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let worker_id = args.worker_id.unwrap_or_else(default_worker_id);
    tracing::info!(worker_id = %worker_id, "assembling health monitor service");

    let state = build_app_state(&config, worker_id).await?;
    state.supervisor.start_monitoring();

    let app = create_server(state.clone());
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!(%addr, "starting health monitor HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.supervisor.stop_monitoring().await;
    Ok(())
}

/// Resolves once Ctrl+C is received, used to trigger a graceful shutdown
/// of both the HTTP server and the supervised monitoring loops.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install Ctrl+C handler");
    }
    tracing::info!("shutdown signal received");
}
