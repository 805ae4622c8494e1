//! Event broadcasting for real-time notifications.
//!
//! Handlers publish user-facing notifications (entry created, entry already
//! exists) and the link worker's pass reports are forwarded as `linked`
//! events. Every connected SSE client receives every event.
//!
//! # Event Types
//!
//! - `notification`: A message for the user, optionally with a link
//! - `linked`: A cross-linking pass finished
//! - `heartbeat`: Sent periodically to keep connections alive
//! - `catchup`: Sent when a subscriber falls behind

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lexicon_core::Slug;
use lexicon_linker::PassReport;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Default channel capacity for the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Heartbeat interval in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Event Types
// ============================================================================

/// An event that can be broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LexiconEvent {
    /// A message for the user.
    Notification(Notification),
    /// A cross-linking pass completed.
    Linked(LinkedEvent),
    /// Periodic heartbeat to keep connection alive.
    Heartbeat(HeartbeatEvent),
    /// Client fell behind and missed events.
    Catchup(CatchupEvent),
}

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-facing message, optionally pointing somewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message_type: MessageType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_label: Option<String>,
}

impl Notification {
    pub fn new(message_type: MessageType, message: impl Into<String>) -> Self {
        Self {
            message_type,
            message: message.into(),
            link_url: None,
            link_label: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(MessageType::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(MessageType::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(MessageType::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(MessageType::Error, message)
    }

    /// Attaches a link shown next to the message.
    pub fn with_link(mut self, url: impl Into<String>, label: impl Into<String>) -> Self {
        self.link_url = Some(url.into());
        self.link_label = Some(label.into());
        self
    }
}

/// Event data for a finished cross-linking pass.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedEvent {
    /// Entry the pass ran for.
    pub slug: Slug,
    /// Number of other entries whose bodies changed.
    pub entries_updated: usize,
    /// Total links inserted.
    pub links_added: usize,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl From<&PassReport> for LinkedEvent {
    fn from(report: &PassReport) -> Self {
        Self {
            slug: report.slug.clone(),
            entries_updated: report.entries_updated,
            links_added: report.links_added,
            timestamp: Utc::now(),
        }
    }
}

/// Heartbeat event data.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatEvent {
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Catchup event sent when subscriber falls behind.
#[derive(Debug, Clone, Serialize)]
pub struct CatchupEvent {
    /// Number of events missed.
    pub events_missed: u64,
    /// Timestamp of the catchup event.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans events out to every connected subscriber.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<LexiconEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    /// Create a new event broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event broadcaster with custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<LexiconEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: LexiconEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => {
                tracing::trace!(receivers = count, "Published event to subscribers");
                count
            }
            Err(_) => {
                tracing::trace!("No subscribers for event");
                0
            }
        }
    }

    /// Publish a user notification.
    pub fn notify(&self, notification: Notification) -> usize {
        self.publish(LexiconEvent::Notification(notification))
    }

    /// Publish the outcome of a cross-linking pass.
    pub fn publish_linked(&self, report: &PassReport) -> usize {
        self.publish(LexiconEvent::Linked(LinkedEvent::from(report)))
    }

    /// Get the number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Forwards link worker reports to the broadcaster until the worker's
/// report channel closes.
pub fn forward_reports(
    mut reports: broadcast::Receiver<PassReport>,
    broadcaster: Arc<EventBroadcaster>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match reports.recv().await {
                Ok(report) => {
                    broadcaster.publish_linked(&report);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Report forwarder lagged behind link worker");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Report forwarder stopped");
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn report(slug: &str, entries_updated: usize) -> PassReport {
        PassReport {
            slug: Slug::parse(slug).unwrap(),
            new_entry_updated: false,
            entries_updated,
            links_added: entries_updated * 2,
            skipped: Vec::new(),
            stale: 0,
        }
    }

    #[tokio::test]
    async fn test_broadcaster_subscribers() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);

        let _r1 = broadcaster.subscribe();
        let _r2 = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_broadcaster_notify() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        let count = broadcaster
            .notify(Notification::success("Entry created").with_link("/entries/go", "View"));
        assert_eq!(count, 1);

        match receiver.recv().await.unwrap() {
            LexiconEvent::Notification(n) => {
                assert_eq!(n.message_type, MessageType::Success);
                assert_eq!(n.link_url.as_deref(), Some("/entries/go"));
                assert_eq!(n.link_label.as_deref(), Some("View"));
            }
            other => panic!("Expected Notification event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.notify(Notification::info("nobody listens")), 0);
    }

    #[tokio::test]
    async fn test_forward_reports() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut receiver = broadcaster.subscribe();
        let (tx, rx) = broadcast::channel(8);

        let handle = forward_reports(rx, Arc::clone(&broadcaster));
        tx.send(report("docker", 3)).unwrap();
        drop(tx);
        handle.await.unwrap();

        match receiver.recv().await.unwrap() {
            LexiconEvent::Linked(e) => {
                assert_eq!(e.slug.as_str(), "docker");
                assert_eq!(e.entries_updated, 3);
                assert_eq!(e.links_added, 6);
            }
            other => panic!("Expected Linked event, got {other:?}"),
        }
    }

    #[test]
    fn test_notification_serialization() {
        let event = LexiconEvent::Notification(
            Notification::info("Entry already exists").with_link("/entries/docker", "View"),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["message_type"], "info");
        assert_eq!(json["message"], "Entry already exists");
        assert_eq!(json["link_url"], "/entries/docker");
        assert_eq!(json["link_label"], "View");
    }

    #[test]
    fn test_notification_without_link_omits_fields() {
        let json = serde_json::to_string(&LexiconEvent::Notification(Notification::error(
            "Linking failed",
        )))
        .unwrap();
        assert!(json.contains("\"message_type\":\"error\""));
        assert!(!json.contains("link_url"));
        assert!(!json.contains("link_label"));

        let warning = Notification::warning("slow");
        assert_eq!(warning.message_type, MessageType::Warning);
    }

    #[test]
    fn test_linked_event_serialization() {
        let event = LexiconEvent::Linked(LinkedEvent::from(&report("api", 2)));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"linked\""));
        assert!(json.contains("\"slug\":\"api\""));
        assert!(json.contains("\"entries_updated\":2"));
    }

    #[test]
    fn test_heartbeat_and_catchup_serialization() {
        let heartbeat = LexiconEvent::Heartbeat(HeartbeatEvent {
            timestamp: Utc::now(),
        });
        let json = serde_json::to_string(&heartbeat).unwrap();
        assert!(json.contains("\"type\":\"heartbeat\""));

        let catchup = LexiconEvent::Catchup(CatchupEvent {
            events_missed: 100,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_string(&catchup).unwrap();
        assert!(json.contains("\"type\":\"catchup\""));
        assert!(json.contains("\"events_missed\":100"));
    }
}
