#![forbid(unsafe_code)]

//! `trio-monitor`: call-center monitoring backend binary.
//!
//! Bootstraps configuration and storage, starts the upstream poller and the
//! retention task, and serves the REST API until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use trio_monitor::api::{self, AppState};
use trio_monitor::config::GlobalConfig;
use trio_monitor::persistence::cache_store::CacheStore;
use trio_monitor::persistence::{db, retention};
use trio_monitor::poller::status::StatusBoard;
use trio_monitor::poller::ticker::IntervalTicker;
use trio_monitor::poller::{spawn_poller, Poller};
use trio_monitor::upstream::TrioClient;
use trio_monitor::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "trio-monitor", about = "Trio Enterprise call-center monitor", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file. Environment variables
    /// override values from the file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("trio-monitor bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load(args.config.as_deref())?;
    config.load_credentials().await?;
    let credentials = config.credentials()?;
    let config = Arc::new(config);
    info!(
        base_url = %config.upstream.base_url,
        contact_center = %config.upstream.contact_center_id,
        interval_seconds = config.poller.interval_seconds,
        "configuration loaded"
    );

    // ── Initialize database and store ───────────────────
    let db = Arc::new(db::connect(&config.database_path).await?);
    let store = Arc::new(CacheStore::open(Arc::clone(&db)).await?);
    info!(path = %config.database_path.display(), "database connected");

    // ── Start background tasks ──────────────────────────
    let ct = CancellationToken::new();
    let retention_handle =
        retention::spawn_retention_task(Arc::clone(&db), config.retention.clone(), ct.clone());

    let status = Arc::new(StatusBoard::new());
    let client = TrioClient::new(&config.upstream, credentials)?;
    let poller = Poller::new(client, Arc::clone(&store), Arc::clone(&status), &config);
    let ticker = IntervalTicker::new(Duration::from_secs(config.poller.interval_seconds));
    let poller_handle = spawn_poller(poller, ticker, ct.clone());

    // ── Start HTTP API ──────────────────────────────────
    let bind = config.http_bind();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP API on {bind}: {err}")))?;
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        store,
        status,
        started_at: Utc::now(),
    });
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(state, listener, http_ct).await {
            error!(%err, "HTTP API failed");
        }
    });

    info!("trio-monitor ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(http_handle, poller_handle, retention_handle);
    db.close().await;
    info!("trio-monitor shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
