use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MESSAGES_TABLE: &str = "messages";

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Auth principal that sent the message
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
}

impl NewMessage {
    /// `None` when the content is blank after trimming.
    pub fn new(chat_id: &str, sender_id: &str, content: &str) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_dropped() {
        assert!(NewMessage::new("chat", "user", "   \n").is_none());
    }

    #[test]
    fn content_is_trimmed() {
        let message = NewMessage::new("chat", "user", "  hello  ").unwrap();
        assert_eq!(message.content, "hello");
    }
}
