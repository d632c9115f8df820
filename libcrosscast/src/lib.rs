//! Crosscast - approval-gated multi-platform content publishing
//!
//! This library provides the core pipeline: a durable SQLite-backed queue
//! with an explicit approval gate, fan-out publishing with per-platform
//! failure isolation, and the resilience layer (retry, circuit breaker,
//! rate limiting) that platform API calls go through.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod notify;
pub mod platforms;
pub mod publisher;
pub mod resilience;
pub mod scheduler;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CrosscastError, Result};
pub use notify::{Event, EventKind, LogNotifier, NoopNotifier, Notifier};
pub use publisher::{CycleOutcome, FanoutPublisher};
pub use scheduler::{ContentSource, Scheduler, StaticContentSource};
pub use types::{Content, PlatformOutcome, QueueItem, QueueStats, QueueStatus};
pub use worker::{Worker, WorkerStats};
