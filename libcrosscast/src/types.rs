//! Core types for Crosscast

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of fully-failed publish cycles after which an item is
/// permanently failed.
pub const MAX_RETRIES: u32 = 3;

/// Opaque content payload carried by a queue item.
///
/// The pipeline never interprets this beyond serializing it; only the
/// per-platform posters read individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Name of the schedule slot that produced this content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl Content {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            media_url: None,
            link: None,
            hashtags: Vec::new(),
            slot: None,
        }
    }
}

/// Lifecycle state of a queue item.
///
/// `Rejected`, `Posted`, and `Failed` are terminal; no transition leaves
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Approved,
    Rejected,
    Posted,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Approved => "approved",
            QueueStatus::Rejected => "rejected",
            QueueStatus::Posted => "posted",
            QueueStatus::Failed => "failed",
        }
    }

    /// Parse a stored status string. Returns `None` for anything the
    /// state machine does not know, so callers surface corruption
    /// instead of silently re-queueing the row.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "approved" => Some(QueueStatus::Approved),
            "rejected" => Some(QueueStatus::Rejected),
            "posted" => Some(QueueStatus::Posted),
            "failed" => Some(QueueStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states are never polled again and are eligible for
    /// retention cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Rejected | QueueStatus::Posted | QueueStatus::Failed
        )
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One entry in an item's append-only error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub timestamp: i64,
    pub attempt: u32,
}

/// Outcome of one publish attempt to one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformOutcome {
    pub fn success(post_id: String, url: Option<String>) -> Self {
        Self {
            success: true,
            post_id: Some(post_id),
            url,
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            post_id: None,
            url: None,
            error: Some(error),
        }
    }
}

/// Per-platform outcomes of a publish cycle, keyed by platform identifier.
pub type PostResults = BTreeMap<String, PlatformOutcome>;

/// The unit of work in the publishing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub content: Content,
    /// Target platforms, fixed at creation. Per-platform outcomes live in
    /// `post_results`, never here.
    pub platforms: Vec<String>,
    pub status: QueueStatus,
    /// Fully-failed publish cycles so far. Never exceeds [`MAX_RETRIES`].
    pub attempts: u32,
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_results: Option<PostResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

impl QueueItem {
    pub fn new(content: Content, platforms: Vec<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            platforms,
            status: QueueStatus::Pending,
            attempts: 0,
            errors: Vec::new(),
            post_results: None,
            rejected_reason: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
            rejected_at: None,
            posted_at: None,
            failed_at: None,
        }
    }

    /// Short caption preview for listings and notifications.
    pub fn preview(&self, max_len: usize) -> String {
        let caption = self.content.caption.trim();
        if caption.chars().count() <= max_len {
            caption.to_string()
        } else {
            let truncated: String = caption.chars().take(max_len).collect();
            format!("{}...", truncated)
        }
    }
}

/// Aggregate queue counts, one per lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub posted: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_item_new_uuid_generation() {
        let item = QueueItem::new(Content::new("hello"), vec!["tiktok".to_string()]);
        assert!(Uuid::parse_str(&item.id).is_ok(), "id should be a valid UUID");
    }

    #[test]
    fn test_queue_item_new_unique_ids() {
        let a = QueueItem::new(Content::new("a"), vec!["tiktok".to_string()]);
        let b = QueueItem::new(Content::new("b"), vec!["tiktok".to_string()]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_queue_item_new_default_values() {
        let item = QueueItem::new(
            Content::new("hello"),
            vec!["tiktok".to_string(), "instagram".to_string()],
        );

        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.errors.is_empty());
        assert!(item.post_results.is_none());
        assert!(item.approved_at.is_none());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::Approved,
            QueueStatus::Rejected,
            QueueStatus::Posted,
            QueueStatus::Failed,
        ] {
            assert_eq!(QueueStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert_eq!(QueueStatus::parse("archived"), None);
        assert_eq!(QueueStatus::parse(""), None);
        assert_eq!(QueueStatus::parse("Pending"), None);
    }

    #[test]
    fn test_status_terminal_states() {
        assert!(!QueueStatus::Pending.is_terminal());
        assert!(!QueueStatus::Approved.is_terminal());
        assert!(QueueStatus::Rejected.is_terminal());
        assert!(QueueStatus::Posted.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&QueueStatus::Approved).unwrap();
        assert_eq!(json, r#""approved""#);

        let parsed: QueueStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(parsed, QueueStatus::Failed);
    }

    #[test]
    fn test_platform_outcome_constructors() {
        let ok = PlatformOutcome::success(
            "vid_123".to_string(),
            Some("https://example.com/vid_123".to_string()),
        );
        assert!(ok.success);
        assert_eq!(ok.post_id.as_deref(), Some("vid_123"));
        assert!(ok.error.is_none());

        let failed = PlatformOutcome::failure("HTTP 500".to_string());
        assert!(!failed.success);
        assert!(failed.post_id.is_none());
        assert_eq!(failed.error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_queue_item_serialization_round_trip() {
        let mut item = QueueItem::new(
            Content {
                caption: "Morning drop".to_string(),
                media_url: Some("https://cdn.example.com/clip.mp4".to_string()),
                link: Some("https://shop.example.com/p/1".to_string()),
                hashtags: vec!["deal".to_string(), "morning".to_string()],
                slot: Some("Morning".to_string()),
            },
            vec!["tiktok".to_string(), "instagram".to_string()],
        );
        item.errors.push(ErrorEntry {
            message: "HTTP 503".to_string(),
            timestamp: 1_700_000_000,
            attempt: 1,
        });
        let mut results = PostResults::new();
        results.insert(
            "tiktok".to_string(),
            PlatformOutcome::success("vid_1".to_string(), None),
        );
        item.post_results = Some(results);

        let json = serde_json::to_string(&item).unwrap();
        let parsed: QueueItem = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, item.id);
        assert_eq!(parsed.content, item.content);
        assert_eq!(parsed.platforms, item.platforms);
        assert_eq!(parsed.status, item.status);
        assert_eq!(parsed.errors, item.errors);
        assert_eq!(parsed.post_results, item.post_results);
    }

    #[test]
    fn test_preview_truncates() {
        let item = QueueItem::new(
            Content::new("a very long caption that keeps going and going"),
            vec!["tiktok".to_string()],
        );
        let preview = item.preview(12);
        assert_eq!(preview, "a very long ...");

        let short = QueueItem::new(Content::new("short"), vec!["tiktok".to_string()]);
        assert_eq!(short.preview(12), "short");
    }
}
