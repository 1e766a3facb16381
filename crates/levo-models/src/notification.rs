use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Distinguishes system narration from text that originated with the oracle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    System,
    Advisor,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::System => "system",
            Channel::Advisor => "advisor",
        }
    }
}

/// A free-form, human readable progress message for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub session_id: SessionId,
    pub channel: Channel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(session_id: SessionId, channel: Channel, message: impl Into<String>) -> Self {
        Self {
            session_id,
            channel,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_serialization() {
        assert_eq!(serde_json::to_string(&Channel::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Channel::Advisor).unwrap(), "\"advisor\"");
    }

    #[test]
    fn roundtrip_notification() {
        let n = Notification::new(SessionId::from("chat-1"), Channel::Advisor, "hold steady");
        let json = serde_json::to_string(&n).unwrap();
        let parsed: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(n, parsed);
    }
}
