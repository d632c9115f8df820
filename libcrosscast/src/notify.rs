//! Pipeline event notifications
//!
//! The worker and scheduler emit events at the milestones an operator
//! cares about. Delivery is fire-and-forget; a notifier must never fail
//! the pipeline.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::publisher::CycleOutcome;
use crate::types::QueueItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PostingStart,
    PostingSuccess,
    PostingFailure,
    ContentGenerated,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PostingStart => "posting_start",
            EventKind::PostingSuccess => "posting_success",
            EventKind::PostingFailure => "posting_failure",
            EventKind::ContentGenerated => "content_generated",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Value,
}

impl Event {
    pub fn posting_start(item: &QueueItem) -> Self {
        Self {
            kind: EventKind::PostingStart,
            payload: json!({
                "item_id": item.id,
                "platforms": item.platforms,
                "preview": item.preview(80),
            }),
        }
    }

    pub fn posting_success(item: &QueueItem, outcome: &CycleOutcome) -> Self {
        Self {
            kind: EventKind::PostingSuccess,
            payload: json!({
                "item_id": item.id,
                "succeeded": outcome.success_count(),
                "failed": outcome.failure_count(),
                "results": outcome.results,
            }),
        }
    }

    pub fn posting_failure(item: &QueueItem, outcome: &CycleOutcome, terminal: bool) -> Self {
        Self {
            kind: EventKind::PostingFailure,
            payload: json!({
                "item_id": item.id,
                "attempts": item.attempts,
                "terminal": terminal,
                "errors": outcome.failure_summary(),
            }),
        }
    }

    pub fn content_generated(item: &QueueItem, slot: &str) -> Self {
        Self {
            kind: EventKind::ContentGenerated,
            payload: json!({
                "item_id": item.id,
                "slot": slot,
                "preview": item.preview(80),
            }),
        }
    }

    pub fn error(context: &str, message: &str) -> Self {
        Self {
            kind: EventKind::Error,
            payload: json!({
                "context": context,
                "message": message,
            }),
        }
    }
}

/// Sink for pipeline events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event);
}

/// Notifier that writes events to the structured log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) {
        tracing::info!(kind = %event.kind, payload = %event.payload, "pipeline event");
    }
}

/// Notifier that discards everything.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, PlatformOutcome, PostResults};

    fn outcome(success: bool) -> CycleOutcome {
        let mut results = PostResults::new();
        results.insert(
            "tiktok".to_string(),
            if success {
                PlatformOutcome::success("vid_1".to_string(), None)
            } else {
                PlatformOutcome::failure("HTTP 503".to_string())
            },
        );
        CycleOutcome { results }
    }

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::PostingStart.as_str(), "posting_start");
        assert_eq!(EventKind::PostingSuccess.as_str(), "posting_success");
        assert_eq!(EventKind::PostingFailure.as_str(), "posting_failure");
        assert_eq!(EventKind::ContentGenerated.as_str(), "content_generated");
        assert_eq!(EventKind::Error.as_str(), "error");
    }

    #[test]
    fn test_event_kind_serde_matches_as_str() {
        for kind in [
            EventKind::PostingStart,
            EventKind::PostingSuccess,
            EventKind::PostingFailure,
            EventKind::ContentGenerated,
            EventKind::Error,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_posting_failure_payload() {
        let mut item = QueueItem::new(Content::new("hello"), vec!["tiktok".to_string()]);
        item.attempts = 3;
        let event = Event::posting_failure(&item, &outcome(false), true);

        assert_eq!(event.kind, EventKind::PostingFailure);
        assert_eq!(event.payload["item_id"], item.id);
        assert_eq!(event.payload["attempts"], 3);
        assert_eq!(event.payload["terminal"], true);
        assert!(event.payload["errors"]
            .as_str()
            .unwrap()
            .contains("tiktok: HTTP 503"));
    }

    #[test]
    fn test_posting_success_payload_counts() {
        let item = QueueItem::new(Content::new("hello"), vec!["tiktok".to_string()]);
        let event = Event::posting_success(&item, &outcome(true));
        assert_eq!(event.payload["succeeded"], 1);
        assert_eq!(event.payload["failed"], 0);
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        let notifier = NoopNotifier;
        let item = QueueItem::new(Content::new("hello"), vec!["tiktok".to_string()]);
        notifier.notify(&Event::posting_start(&item)).await;
    }
}
