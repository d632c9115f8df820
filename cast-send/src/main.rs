//! cast-send - Background daemon for approved content
//!
//! Polls the queue for approved items and publishes them across their
//! target platforms. Optionally runs the daily schedule that generates
//! content into the approval queue.

use clap::Parser;
use libcrosscast::config::Config;
use libcrosscast::logging::LoggingConfig;
use libcrosscast::notify::LogNotifier;
use libcrosscast::platforms::instagram::InstagramPoster;
use libcrosscast::platforms::tiktok::TikTokPoster;
use libcrosscast::platforms::PosterRegistry;
use libcrosscast::resilience::ResilientClient;
use libcrosscast::scheduler::{Scheduler, StaticContentSource};
use libcrosscast::{CrosscastError, Database, FanoutPublisher, Result, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cast-send")]
#[command(version)]
#[command(about = "Background daemon for approved content")]
#[command(long_about = "\
cast-send - Background daemon for approved content

DESCRIPTION:
    cast-send is a long-running daemon that monitors the Crosscast queue
    and publishes approved content to its target platforms.

    It polls the database at regular intervals, fans each item out to
    every platform it targets, isolates per-platform failures, retries
    failed items on later polls, and marks items posted or failed.

    With scheduling enabled it also fires at the configured times of day,
    generating content into the queue as pending items that still require
    approval.

USAGE:
    # Run in foreground (logs to stderr)
    cast-send

    # Run with custom poll interval
    cast-send --poll-interval 10

    # One poll cycle, then exit
    cast-send --once

    # Enable verbose logging
    cast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current item)

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Database location: ~/.local/share/crosscast/queue.db

    Override with environment variables:
        CROSSCAST_CONFIG      - Path to config file
        CROSSCAST_LOG_FORMAT  - text, json, or pretty
        CROSSCAST_LOG_LEVEL   - error, warn, info, debug, trace

    [worker]
    poll_interval_secs = 30
    inter_item_delay_secs = 5
    inter_platform_delay_secs = 2
    max_retries = 3

    [platforms.tiktok]
    access_token = \"...\"

    [platforms.instagram]
    access_token = \"...\"
    business_account_id = \"...\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for approved items (default: 30)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one poll cycle and exit (for testing)
    #[arg(long)]
    #[arg(help = "Process approved items once and exit")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LoggingConfig::from_env("info", cli.verbose).init();

    let mut config = Config::load()?;
    if let Some(secs) = cli.poll_interval {
        config.worker.poll_interval_secs = secs;
    }

    let db = Database::with_max_retries(&config.database.path, config.worker.max_retries).await?;

    info!("cast-send daemon starting");

    let registry = Arc::new(build_registry(&config)?);
    if registry.is_empty() {
        warn!("no platforms configured, approved items will fail their cycles");
    } else {
        info!(platforms = ?registry.names(), "platforms configured");
    }

    let publisher = FanoutPublisher::new(registry, config.worker.inter_platform_delay());
    let notifier = Arc::new(LogNotifier);
    let mut worker = Worker::new(db.clone(), publisher, notifier.clone(), config.worker.clone());

    if cli.once {
        let processed = worker.run_once().await?;
        info!(processed, "cast-send: processed approved items once, exiting");
        return Ok(());
    }

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Poll interval: {}s", config.worker.poll_interval_secs);

    // Run the schedule loop alongside the worker when enabled
    let scheduler_task = if config.schedule.enabled {
        let mut scheduler = Scheduler::new(
            db,
            Arc::new(StaticContentSource::default()),
            notifier,
            &config.schedule,
        )?;
        let shutdown = shutdown.clone();
        Some(tokio::spawn(
            async move { scheduler.run(shutdown).await },
        ))
    } else {
        None
    };

    worker.run(shutdown).await?;

    if let Some(task) = scheduler_task {
        match task.await {
            Ok(result) => result?,
            Err(e) => warn!(error = %e, "scheduler task panicked"),
        }
    }

    info!("cast-send daemon stopped");
    Ok(())
}

/// Build the poster registry from whatever platforms are configured.
/// Each poster gets its own resilience stack so failure domains stay
/// separate.
fn build_registry(config: &Config) -> Result<PosterRegistry> {
    let mut registry = PosterRegistry::new();

    if let Some(tiktok) = &config.platforms.tiktok {
        let client = Arc::new(ResilientClient::new(
            "tiktok",
            config.retry.to_retry_config(),
            config.breaker.to_breaker_config(),
            config.limiter.calls_per_second,
        ));
        registry.register(Arc::new(TikTokPoster::new(tiktok.clone(), client)?));
    }

    if let Some(instagram) = &config.platforms.instagram {
        let client = Arc::new(ResilientClient::new(
            "instagram",
            config.retry.to_retry_config(),
            config.breaker.to_breaker_config(),
            config.limiter.calls_per_second,
        ));
        registry.register(Arc::new(InstagramPoster::new(instagram.clone(), client)?));
    }

    Ok(registry)
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| CrosscastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    // Spawn thread to handle signals
    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::SeqCst);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libcrosscast::config::{InstagramConfig, TikTokConfig};

    #[test]
    fn test_registry_empty_without_platform_config() {
        let config = Config::default_config();
        let registry = build_registry(&config).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_from_config() {
        let mut config = Config::default_config();
        config.platforms.tiktok = Some(TikTokConfig {
            access_token: "tt".to_string(),
            api_base: "https://open.tiktokapis.com/v2".to_string(),
        });
        config.platforms.instagram = Some(InstagramConfig {
            access_token: "ig".to_string(),
            business_account_id: "178".to_string(),
            api_base: "https://graph.facebook.com/v19.0".to_string(),
        });

        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.names(), vec!["instagram", "tiktok"]);
    }
}
