//! Background publish loop
//!
//! Polls the approved queue on a fixed interval and runs a publish cycle
//! for each item. Per-item errors are contained: one broken item never
//! takes down the loop. Shutdown is cooperative via an [`AtomicBool`],
//! checked during every sleep so the loop winds down within a second.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::db::Database;
use crate::error::Result;
use crate::notify::{Event, Notifier};
use crate::publisher::FanoutPublisher;
use crate::types::{QueueItem, QueueStatus};

/// Counters accumulated over the worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub items_processed: u64,
    pub items_posted: u64,
    pub items_failed: u64,
    pub items_retried: u64,
}

pub struct Worker {
    db: Database,
    publisher: FanoutPublisher,
    notifier: Arc<dyn Notifier>,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        db: Database,
        publisher: FanoutPublisher,
        notifier: Arc<dyn Notifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            db,
            publisher,
            notifier,
            config,
            stats: WorkerStats::default(),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Run the poll loop until `shutdown` is set.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "worker started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.process_approved(&shutdown).await {
                tracing::error!(error = %e, "poll cycle failed");
                self.notifier
                    .notify(&Event::error("worker", &e.to_string()))
                    .await;
            }

            if !sleep_with_shutdown(self.config.poll_interval(), &shutdown).await {
                break;
            }
        }

        tracing::info!(
            cycles = self.stats.cycles,
            items_posted = self.stats.items_posted,
            items_failed = self.stats.items_failed,
            "worker stopped"
        );
        Ok(())
    }

    /// Run exactly one poll cycle. Returns the number of items processed.
    pub async fn run_once(&mut self) -> Result<usize> {
        let shutdown = AtomicBool::new(false);
        self.process_approved(&shutdown).await
    }

    async fn process_approved(&mut self, shutdown: &AtomicBool) -> Result<usize> {
        self.stats.cycles += 1;
        let items = self.db.list_by_status(QueueStatus::Approved).await?;
        if items.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = items.len(), "processing approved items");
        let mut processed = 0;

        for (i, item) in items.into_iter().enumerate() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            if i > 0
                && !sleep_with_shutdown(self.config.inter_item_delay(), shutdown).await
            {
                break;
            }

            // A failed item must not stop the rest of the cycle
            match self.process_item(&item).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::error!(item_id = %item.id, error = %e, "item processing failed");
                    self.notifier
                        .notify(&Event::error("worker", &e.to_string()))
                        .await;
                }
            }
        }

        Ok(processed)
    }

    async fn process_item(&mut self, item: &QueueItem) -> Result<()> {
        self.stats.items_processed += 1;
        self.notifier.notify(&Event::posting_start(item)).await;

        let outcome = self.publisher.publish(item).await;

        if outcome.any_success() {
            let posted = self.db.record_success(&item.id, &outcome.results).await?;
            self.stats.items_posted += 1;
            self.notifier
                .notify(&Event::posting_success(&posted, &outcome))
                .await;
        } else {
            let updated = self
                .db
                .record_failure(&item.id, &outcome.failure_summary(), &outcome.results)
                .await?;
            let terminal = updated.status == QueueStatus::Failed;
            if terminal {
                self.stats.items_failed += 1;
            } else {
                self.stats.items_retried += 1;
            }
            self.notifier
                .notify(&Event::posting_failure(&updated, &outcome, terminal))
                .await;
        }

        Ok(())
    }
}

/// Sleep for `duration` in one-second slices, bailing out early when the
/// shutdown flag is raised. Returns false if shutdown was requested.
pub(crate) async fn sleep_with_shutdown(duration: Duration, shutdown: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(Duration::from_secs(1));
        tokio::time::sleep(slice).await;
        remaining -= slice;
    }
    !shutdown.load(Ordering::SeqCst)
}
