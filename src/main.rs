use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use newscache::config::Config;
use newscache::feed::HttpFetcher;
use newscache::news::{CacheService, RefreshScheduler};

/// Get the default config file path (~/.config/newscache/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("newscache")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "newscache",
    about = "Keeps a ranked snapshot of several RSS feeds fresh in memory",
    long_about = "Keeps a ranked snapshot of several RSS feeds fresh in memory.\n\n\
        Without --once this runs only the refresh loop and serves no requests: \
        it is meant for checking feeds and settings, or as the refresh half of \
        a process that embeds the newscache library and answers readers through \
        CacheService. Use --once (and --since) to print a snapshot or delta."
)]
struct Args {
    /// Config file (defaults to ~/.config/newscache/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Build one snapshot, print it, and exit
    #[arg(long)]
    once: bool,

    /// With --once, print only items newer than this cutoff (YYYYMMDDHHMMSS+HHMM)
    #[arg(long, value_name = "CUTOFF", requires = "once")]
    since: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.validate().context("Refusing to start")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("newscache/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = HttpFetcher::new(client, config.request_timeout());

    let service = Arc::new(CacheService::new());
    let scheduler = RefreshScheduler::new(Arc::clone(&service), fetcher, config.refresh_settings());

    if args.once {
        scheduler
            .refresh_once()
            .await
            .context("Failed to build news snapshot")?;

        let body = match args.since.as_deref() {
            Some(cutoff) => service
                .get_delta(Some(cutoff), config.delta_encoding)
                .await?
                .to_vec(),
            None => service.get_snapshot_indented().await?,
        };

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&body)?;
        writeln!(stdout)?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            // Dropping the sender would stop the scheduler.
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl-C, shutting down");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        mode = "refresh-only",
        sources = config.sources.len(),
        interval_secs = config.refresh_interval_secs,
        capacity = config.capacity,
        policy = ?config.on_refresh_failure,
        lock = ?config.lock_strategy,
        "Starting refresh scheduler"
    );

    // Under the fatal policy a failed refresh ends the process with an error.
    scheduler
        .run(shutdown_rx)
        .await
        .context("News refresh failed")?;

    tracing::info!(version = service.version(), "Stopped");
    Ok(())
}
