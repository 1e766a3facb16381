use async_trait::async_trait;
use levo_models::{Channel, Notification};
use tokio::sync::mpsc;
use tracing::info;

/// Sentinels the oracle emits that must never reach a user.
const SUPPRESSED: [&str; 2] = ["TERMINATE", "!@#$^"];

/// Destination for per-session narration. Delivery is best effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Blank messages and oracle sentinels are dropped before delivery.
pub fn should_deliver(message: &str) -> bool {
    let trimmed = message.trim();
    !trimmed.is_empty() && !SUPPRESSED.contains(&trimmed)
}

/// Logs every notification as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: Notification) {
        if !should_deliver(&notification.message) {
            return;
        }
        info!(
            session_id = %notification.session_id,
            channel = notification.channel.as_str(),
            "{}",
            notification.message
        );
    }
}

/// Forwards notifications to an in-process receiver (chat UI bridge, tests).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, notification: Notification) {
        if !should_deliver(&notification.message) {
            return;
        }
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(notification);
    }
}

/// Convenience for building notifications on the system channel.
pub fn system(session_id: &levo_models::SessionId, message: impl Into<String>) -> Notification {
    Notification::new(session_id.clone(), Channel::System, message)
}
