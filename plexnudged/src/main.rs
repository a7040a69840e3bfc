//! # plexnudged
//!
//! Daemon that watches directories for finished media transfers, maps the
//! arriving paths into a Plex server's view of the filesystem, and nudges
//! the server to rescan just those paths after a quiet period.

mod config;
mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plexnudge_core::{PlexClient, RefreshScheduler};

use crate::config::{ConfigLoad, ConfigLoader};
use crate::watch::TransferWatcher;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "plexnudged")]
#[command(
    about = "Watches finished media transfers and schedules batched partial refreshes on a Plex server"
)]
struct Cli {
    /// Path to plexnudge.toml (overrides the default search locations)
    #[arg(long, env = "PLEXNUDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading the environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file {
        loader = loader.with_env_file(path);
    }
    // Load before installing the subscriber so RUST_LOG from a .env file
    // takes effect.
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration loaded");
    }
    if !warnings.is_empty() {
        for warning in &warnings.items {
            match &warning.hint {
                Some(hint) => {
                    warn!(message = %warning.message, hint = %hint, "configuration warning")
                }
                None => {
                    warn!(message = %warning.message, "configuration warning")
                }
            }
        }
    }

    if cli.print_config {
        println!("{config:#?}");
        return Ok(());
    }

    if !config.enabled {
        info!("plexnudged is disabled; set enabled = true or PLEXNUDGE_ENABLED=1 to activate");
        return Ok(());
    }

    let server = config
        .server
        .clone()
        .context("no usable Plex server resolved from configuration")?;
    let client =
        PlexClient::new(server).context("failed to construct Plex client")?;
    let scheduler = Arc::new(RefreshScheduler::new(
        Arc::new(client),
        config.scheduler.clone(),
    ));

    if config.watch_roots.is_empty() {
        anyhow::bail!("nothing to watch: configure [[path_map]] entries or watch.roots");
    }

    let path_map = Arc::new(config.path_map.clone());
    let handler_scheduler = Arc::clone(&scheduler);
    let handler = move |path: &Path| {
        let Some(local) = path.to_str() else {
            warn!(path = %path.display(), "ignoring non-UTF-8 arrival");
            return;
        };
        // An unmapped arrival is logged by the map itself.
        if let Some(destination) = path_map.map(local) {
            debug!(local, destination = %destination, "arrival mapped");
            handler_scheduler.schedule(&destination);
        }
    };
    let watcher = TransferWatcher::spawn(config.watch_roots.clone(), handler)
        .context("failed to start transfer watcher")?;

    info!(
        delay_secs = config.scheduler.batch_delay.as_secs(),
        roots = config.watch_roots.len(),
        mappings = config.path_map.len(),
        "plexnudged running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining");
    watcher.shutdown();
    scheduler.shutdown();

    Ok(())
}
