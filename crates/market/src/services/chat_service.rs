//! Chat messages and their live feed.

use std::sync::Arc;

use bazaar_backend::{
    Backend, ChangeKind, ChannelFilter, DataApiExt, Direction, Filter, Query, Subscription,
};
use tracing::{debug, info, warn};

use crate::entities::{Message, NewMessage, MESSAGES_TABLE};
use crate::services::require_session;
use crate::types::MarketResult;

pub struct ChatService {
    backend: Arc<dyn Backend>,
}

impl ChatService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Messages of a chat, oldest first. Failures yield an empty list.
    pub async fn list_messages(&self, chat_id: &str) -> Vec<Message> {
        let query = Query::from(MESSAGES_TABLE)
            .eq("chat_id", chat_id)
            .order("created_at", Direction::Ascending);
        match self.backend.select_as(&query).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(chat_id, error = %err, "failed to load messages");
                Vec::new()
            }
        }
    }

    /// Send as the signed-in principal. Blank content is dropped without a call.
    pub async fn send_message(&self, chat_id: &str, content: &str) -> MarketResult<Option<Message>> {
        let session = require_session(&*self.backend).await?;
        let Some(row) = NewMessage::new(chat_id, &session.user.id, content) else {
            debug!(chat_id, "ignoring empty message");
            return Ok(None);
        };

        let message: Message = self.backend.insert_as(MESSAGES_TABLE, &row).await?;
        info!(chat_id, message_id = %message.id, "message sent");
        Ok(Some(message))
    }

    /// Live feed of new messages in one chat. Dropping it unsubscribes.
    pub async fn subscribe(&self, chat_id: &str) -> MarketResult<MessageSubscription> {
        let channel = ChannelFilter::new(MESSAGES_TABLE, ChangeKind::Insert)
            .named(format!("chat:{chat_id}"))
            .filter(Filter::Eq("chat_id".to_string(), chat_id.to_string()));
        let inner = self.backend.subscribe(channel).await?;
        Ok(MessageSubscription { inner })
    }
}

pub struct MessageSubscription {
    inner: Subscription,
}

impl MessageSubscription {
    /// Next decoded message; undecodable rows are skipped.
    pub async fn next(&mut self) -> Option<Message> {
        while let Some(change) = self.inner.next().await {
            match serde_json::from_value(change.record) {
                Ok(message) => return Some(message),
                Err(err) => warn!(error = %err, "skipping undecodable message row"),
            }
        }
        None
    }
}
