//! User-facing notices, fanned out over a `tokio::sync::broadcast` channel.
//!
//! The studio publishes a [`Notice`] whenever something the user should
//! see happens as a side effect: a transport failure, a shared setting
//! overwritten by auto motion, a duration budget overrun. Any number of
//! front ends can subscribe.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use sceneforge_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Notice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Transient notices dismiss themselves after this long.
    pub dismiss_after: Option<Duration>,
    pub created_at: Timestamp,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            dismiss_after: None,
            created_at: Utc::now(),
        }
    }

    /// Make the notice transient.
    pub fn dismiss_after(mut self, after: Duration) -> Self {
        self.dismiss_after = Some(after);
        self
    }
}

// ---------------------------------------------------------------------------
// NoticeBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of [`Notice`]s.
///
/// Slow receivers that fall more than the capacity behind observe
/// `RecvError::Lagged` and miss the oldest notices.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: broadcast::Sender<Notice>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when nobody listens.
    pub fn publish(&self, notice: Notice) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_notice() {
        let bus = NoticeBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Notice::error("director unreachable").dismiss_after(Duration::from_secs(6)));

        let n1 = rx1.recv().await.expect("subscriber 1 should receive");
        let n2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(n1.level, NoticeLevel::Error);
        assert_eq!(n1.dismiss_after, Some(Duration::from_secs(6)));
        assert_eq!(n2.message, "director unreachable");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        NoticeBus::default().publish(Notice::info("nobody listening"));
    }

    #[test]
    fn notices_are_persistent_by_default() {
        let notice = Notice::warning("over budget");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.dismiss_after.is_none());
    }
}
