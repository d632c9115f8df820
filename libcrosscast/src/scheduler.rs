//! Scheduled content generation
//!
//! Fires at configured local times of day, asks a [`ContentSource`] for
//! content, and enqueues the result in `pending` state so it still goes
//! through approval. A `(date, slot)` ledger makes each slot fire at most
//! once per day; entries from previous days are pruned as dates roll over.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Timelike};

use crate::config::ScheduleConfig;
use crate::db::Database;
use crate::error::{ConfigError, Result};
use crate::notify::{Event, Notifier};
use crate::types::{Content, QueueItem};
use crate::worker::sleep_with_shutdown;

/// A slot fires within this many minutes of its configured time, so a
/// tick that lands just past the minute boundary does not skip the day.
const FIRE_WINDOW_MINUTES: u32 = 2;

/// Parse a "HH:MM" time of day.
pub fn parse_slot_time(s: &str) -> Option<(u32, u32)> {
    let (hour, minute) = s.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub hour: u32,
    pub minute: u32,
    pub name: String,
}

impl Slot {
    fn minutes_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// Produces the content for a schedule slot.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn generate(&self, slot: &Slot) -> Result<Content>;
}

/// Content source that rotates through a fixed set of captions.
///
/// Useful as a default and in tests; production deployments substitute a
/// source that pulls from a feed or a generator.
pub struct StaticContentSource {
    captions: Vec<String>,
    hashtags: Vec<String>,
    counter: std::sync::atomic::AtomicUsize,
}

impl StaticContentSource {
    pub fn new(captions: Vec<String>, hashtags: Vec<String>) -> Self {
        Self {
            captions,
            hashtags,
            counter: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl Default for StaticContentSource {
    fn default() -> Self {
        Self::new(
            vec![
                "Fresh picks are live, check the link in bio".to_string(),
                "Today's top finds, while they last".to_string(),
                "Hand-picked deals for your feed".to_string(),
            ],
            vec!["deals".to_string(), "finds".to_string()],
        )
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn generate(&self, slot: &Slot) -> Result<Content> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let caption = self.captions[n % self.captions.len()].clone();
        Ok(Content {
            caption: format!("{} slot: {}", slot.name, caption),
            media_url: None,
            link: None,
            hashtags: self.hashtags.clone(),
            slot: Some(slot.name.clone()),
        })
    }
}

pub struct Scheduler {
    db: Database,
    source: Arc<dyn ContentSource>,
    notifier: Arc<dyn Notifier>,
    slots: Vec<Slot>,
    platforms: Vec<String>,
    fired: HashSet<(NaiveDate, usize)>,
}

impl Scheduler {
    pub fn new(
        db: Database,
        source: Arc<dyn ContentSource>,
        notifier: Arc<dyn Notifier>,
        config: &ScheduleConfig,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(config.slots.len());
        for slot in &config.slots {
            let (hour, minute) =
                parse_slot_time(&slot.time).ok_or_else(|| ConfigError::InvalidValue {
                    field: "schedule.slots".to_string(),
                    message: format!("'{}' is not a valid HH:MM time", slot.time),
                })?;
            slots.push(Slot {
                hour,
                minute,
                name: slot.name.clone(),
            });
        }

        Ok(Self {
            db,
            source,
            notifier,
            slots,
            platforms: config.platforms.clone(),
            fired: HashSet::new(),
        })
    }

    /// Evaluate the schedule at `now`, enqueueing content for every slot
    /// that is due and has not fired today. Returns the enqueued items.
    pub async fn tick(&mut self, now: DateTime<Local>) -> Result<Vec<QueueItem>> {
        let today = now.date_naive();
        self.fired.retain(|(date, _)| *date == today);

        let now_minutes = now.hour() * 60 + now.minute();
        let mut enqueued = Vec::new();

        for (idx, slot) in self.slots.iter().enumerate() {
            let slot_minutes = slot.minutes_of_day();
            let due =
                now_minutes >= slot_minutes && now_minutes < slot_minutes + FIRE_WINDOW_MINUTES;
            if !due || self.fired.contains(&(today, idx)) {
                continue;
            }

            let content = self.source.generate(slot).await?;
            let item = QueueItem::new(content, self.platforms.clone());
            self.db.add(&item).await?;
            self.fired.insert((today, idx));

            tracing::info!(
                item_id = %item.id,
                slot = %slot.name,
                date = %today.format("%Y-%m-%d"),
                "scheduled content enqueued"
            );
            self.notifier
                .notify(&Event::content_generated(&item, &slot.name))
                .await;
            enqueued.push(item);
        }

        Ok(enqueued)
    }

    /// Run the one-minute tick loop until `shutdown` is set.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        tracing::info!(slots = self.slots.len(), "scheduler started");

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.tick(Local::now()).await {
                tracing::error!(error = %e, "schedule tick failed");
                self.notifier
                    .notify(&Event::error("scheduler", &e.to_string()))
                    .await;
            }

            if !sleep_with_shutdown(Duration::from_secs(60), &shutdown).await {
                break;
            }
        }

        tracing::info!("scheduler stopped");
        Ok(())
    }
}
