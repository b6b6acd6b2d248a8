/*
newsflash - single-binary main.rs
This binary runs the scrape -> store -> notify worker on a fixed interval.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::init_db_pool;

use newsflash::ingestion;
use newsflash::scraping;
use newsflash::storage;
use newsflash::subscribers::SqliteDirectory;
use newsflash::telegram::TelegramChannel;
use newsflash::worker::{self, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "newsflash", about = "Newsflash scraping worker + Telegram notifier")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Delete all stored articles before starting
    #[arg(long)]
    reset_articles: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref()
    ).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // Initialize DB pool - resolve and log the absolute DB path before connecting
    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let db_pool = match init_db_pool(&db_path_abs).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };

    // Bootstrap schema and mirror configured subscribers into the DB
    storage::ensure_schema(&db_pool).await?;
    common::sync_subscribers(&config, &db_pool).await?;
    info!("configuration subscribers synchronized into database");

    if args.reset_articles {
        let removed = storage::clear_articles(&db_pool).await?;
        info!(removed, "cleared stored articles (--reset-articles)");
    }

    // Assemble the pipeline's injected dependencies
    let pipeline = build_pipeline(&config, db_pool)?;

    let interval = Duration::from_secs(config.scheduler.interval_seconds);

    if args.once {
        info!("running a single cycle (--once)");
        let report = worker::run_cycle(&pipeline).await;
        for fault in &report.faults {
            error!(%fault, "cycle fault");
        }
        info!(
            new = report.total_new(),
            notified = report.total_notified(),
            faults = report.faults.len(),
            "single cycle finished"
        );
        return Ok(());
    }

    // Prepare a shutdown notifier to signal the worker task
    let shutdown_notify = Arc::new(Notify::new());

    info!("Spawning scrape worker task");
    let w_shutdown = shutdown_notify.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker::run_worker(pipeline, interval, w_shutdown).await {
            error!(%e, "background worker failed");
            Err(e)
        } else {
            Ok(())
        }
    });

    // Wait for CTRL-C, then let the in-flight cycle finish
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, notifying worker to shutdown");
    // notify_one stores a permit, so a worker that is mid-cycle still
    // observes the shutdown at its next select point.
    shutdown_notify.notify_one();

    match tokio::time::timeout(Duration::from_secs(20), worker_handle).await {
        Ok(join_res) => match join_res {
            Ok(Ok(())) => info!("worker exited cleanly"),
            Ok(Err(e)) => error!(%e, "worker task returned an error"),
            Err(join_err) => error!(%join_err, "worker task panicked"),
        },
        Err(_) => {
            info!("Timed out waiting for worker to exit; continuing shutdown");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wire up HTTP client, source adapters, subscriber directory and delivery
/// channel from the loaded configuration.
fn build_pipeline(config: &Config, db_pool: sqlx::SqlitePool) -> Result<Pipeline> {
    let fetch = config.fetch.as_ref();
    let timeout_secs = fetch
        .and_then(|f| f.timeout_seconds)
        .unwrap_or(ingestion::DEFAULT_TIMEOUT_SECONDS);
    let user_agent = fetch
        .and_then(|f| f.user_agent.clone())
        .unwrap_or_else(|| ingestion::DEFAULT_USER_AGENT.to_string());
    let max_attempts = fetch
        .and_then(|f| f.max_attempts)
        .unwrap_or(ingestion::DEFAULT_MAX_ATTEMPTS);

    let client = ingestion::build_client(timeout_secs, &user_agent)?;
    let sources = scraping::default_sources(client, max_attempts);

    // Fetch the bot token from the environment variable named in config
    let telegram = config.telegram.as_ref();
    let token_env = telegram
        .and_then(|t| t.token_env.as_deref())
        .unwrap_or("TELEGRAM_BOT_TOKEN");
    let token = std::env::var(token_env)
        .with_context(|| format!("Telegram bot token env var '{}' not set", token_env))?;

    let mut channel = TelegramChannel::new(token);
    if let Some(api_url) = telegram.and_then(|t| t.api_url.clone()) {
        channel = channel.with_api_base(api_url);
    }
    if let Some(timeout) = telegram.and_then(|t| t.timeout_seconds) {
        channel = channel.with_timeout(timeout);
    }

    Ok(Pipeline {
        pool: db_pool.clone(),
        sources,
        directory: Box::new(SqliteDirectory::new(db_pool)),
        channel: Box::new(channel),
    })
}
