//! cast-queue - Manage the content queue
//!
//! Unix-style tool for the approval gate: add content, review the queue,
//! approve or reject items, and keep the store tidy.

use clap::{Parser, Subcommand};
use libcrosscast::error::ConfigError;
use libcrosscast::logging::LoggingConfig;
use libcrosscast::types::{Content, QueueItem, QueueStatus};
use libcrosscast::{Config, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cast-queue")]
#[command(version)]
#[command(about = "Manage the content queue")]
#[command(long_about = "\
cast-queue - Manage the content queue

DESCRIPTION:
    cast-queue is a Unix-style tool for the Crosscast approval gate.
    Content enters the queue as pending; nothing is published until a
    human approves it. The cast-send daemon picks up approved items.

COMMANDS:
    add       Add content to the queue (pending)
    list      List queue items
    approve   Approve a pending item for publishing
    reject    Reject a pending item
    remove    Delete an item outright
    stats     Show queue statistics
    cleanup   Delete old completed items

USAGE EXAMPLES:
    # Queue a post for both platforms
    cast-queue add \"Fresh deal today\" --media-url https://cdn.example.com/clip.mp4 \\
        --platforms tiktok,instagram --hashtags deals,savings

    # Review what is waiting
    cast-queue list --status pending

    # Approve or reject
    cast-queue approve <ITEM_ID>
    cast-queue reject <ITEM_ID> --reason \"off brand\"

    # Queue statistics as JSON
    cast-queue stats --format json

    # Drop completed items older than a week
    cast-queue cleanup --max-age-days 7

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Database location: ~/.local/share/crosscast/queue.db

    Override with environment variables:
        CROSSCAST_CONFIG      - Path to config file
        CROSSCAST_LOG_FORMAT  - text, json, or pretty
        CROSSCAST_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Authentication error
    3 - Invalid input (bad item ID, wrong state, bad format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add content to the queue
    Add {
        /// Caption text
        caption: String,

        /// URL of the video or image to publish
        #[arg(long)]
        media_url: Option<String>,

        /// Link appended to the caption
        #[arg(long)]
        link: Option<String>,

        /// Comma-separated hashtags (without '#')
        #[arg(long, value_delimiter = ',')]
        hashtags: Vec<String>,

        /// Comma-separated target platforms
        #[arg(short, long, value_delimiter = ',', default_value = "tiktok,instagram")]
        platforms: Vec<String>,
    },

    /// List queue items
    List {
        /// Filter by status: pending, approved, rejected, posted, failed
        #[arg(short, long)]
        status: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Approve a pending item for publishing
    Approve {
        /// Item ID to approve
        item_id: String,
    },

    /// Reject a pending item
    Reject {
        /// Item ID to reject
        item_id: String,

        /// Why the item was rejected
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Delete an item outright
    Remove {
        /// Item ID to remove
        item_id: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete completed items older than the retention window
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 7)]
        max_age_days: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Quiet by default so stdout stays clean for piping
    LoggingConfig::from_env("error", cli.verbose).init();

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Load the config file, falling back to defaults when none exists yet
fn load_config() -> Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(CrosscastError::Config(ConfigError::ReadError(e)))
            if e.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(Config::default_config())
        }
        Err(e) => Err(e),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let db = Database::with_max_retries(&config.database.path, config.worker.max_retries).await?;

    match cli.command {
        Commands::Add {
            caption,
            media_url,
            link,
            hashtags,
            platforms,
        } => {
            cmd_add(&db, caption, media_url, link, hashtags, platforms).await?;
        }
        Commands::List { status, format } => {
            cmd_list(&db, status.as_deref(), &format).await?;
        }
        Commands::Approve { item_id } => {
            let item = db.approve(&item_id).await?;
            println!("approved {}", item.id);
        }
        Commands::Reject { item_id, reason } => {
            let item = db.reject(&item_id, reason.as_deref()).await?;
            println!("rejected {}", item.id);
        }
        Commands::Remove { item_id } => {
            db.remove(&item_id).await?;
            println!("removed {}", item_id);
        }
        Commands::Stats { format } => {
            cmd_stats(&db, &format).await?;
        }
        Commands::Cleanup { max_age_days } => {
            let removed = db.cleanup(max_age_days).await?;
            println!("removed {} item(s)", removed);
        }
    }

    Ok(())
}

/// Add content to the queue
async fn cmd_add(
    db: &Database,
    caption: String,
    media_url: Option<String>,
    link: Option<String>,
    hashtags: Vec<String>,
    platforms: Vec<String>,
) -> Result<()> {
    if caption.trim().is_empty() {
        return Err(CrosscastError::InvalidInput(
            "Caption cannot be empty".to_string(),
        ));
    }

    let content = Content {
        caption,
        media_url,
        link,
        hashtags: hashtags.into_iter().filter(|t| !t.is_empty()).collect(),
        slot: None,
    };
    let item = QueueItem::new(content, platforms);
    db.add(&item).await?;

    println!("{}", item.id);
    Ok(())
}

fn parse_status(s: &str) -> Result<QueueStatus> {
    match s {
        "pending" => Ok(QueueStatus::Pending),
        "approved" => Ok(QueueStatus::Approved),
        "rejected" => Ok(QueueStatus::Rejected),
        "posted" => Ok(QueueStatus::Posted),
        "failed" => Ok(QueueStatus::Failed),
        other => Err(CrosscastError::InvalidInput(format!(
            "Invalid status '{}'. Must be one of: pending, approved, rejected, posted, failed",
            other
        ))),
    }
}

/// List queue items
async fn cmd_list(db: &Database, status: Option<&str>, format: &str) -> Result<()> {
    validate_format(format)?;

    let items = match status {
        Some(s) => db.list_by_status(parse_status(s)?).await?,
        None => db.list_all().await?,
    };

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&items)
                .map_err(|e| CrosscastError::InvalidInput(e.to_string()))?
        );
    } else {
        output_list_text(&items);
    }

    Ok(())
}

/// Output items as human-readable text, one line per item
fn output_list_text(items: &[QueueItem]) {
    for item in items {
        let age = format_age(chrono::Utc::now().timestamp() - item.created_at);
        println!(
            "{} | {:8} | {} | {} | {}",
            item.id,
            item.status,
            item.platforms.join(","),
            item.preview(50),
            age
        );
    }
}

/// Format seconds since creation in human-readable form
fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("{} minute{} ago", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "just now".to_string()
    }
}

/// Show queue statistics
async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;

    let stats = db.stats().await?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats)
                .map_err(|e| CrosscastError::InvalidInput(e.to_string()))?
        );
    } else {
        println!("total:    {}", stats.total);
        println!("pending:  {}", stats.pending);
        println!("approved: {}", stats.approved);
        println!("rejected: {}", stats.rejected);
        println!("posted:   {}", stats.posted);
        println!("failed:   {}", stats.failed);
    }

    Ok(())
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(CrosscastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}
