//! Chat history, sending and the live message feed.

mod common;

use std::time::Duration;

use bazaar_backend::AuthApi;
use bazaar_market::{ChatService, MarketError};
use serde_json::json;
use tokio::time::timeout;

use common::{marketplace_backend, shared, signed_in_member};

#[tokio::test]
async fn history_is_oldest_first_and_scoped_to_the_chat() {
    let backend = marketplace_backend().await;
    backend
        .seed(
            "messages",
            vec![
                json!({"id": "m2", "chat_id": "chat-1", "sender_id": "u1", "content": "second",
                       "created_at": "2024-01-01T10:05:00Z"}),
                json!({"id": "m1", "chat_id": "chat-1", "sender_id": "u2", "content": "first",
                       "created_at": "2024-01-01T10:00:00Z"}),
                json!({"id": "x", "chat_id": "chat-2", "sender_id": "u2", "content": "elsewhere",
                       "created_at": "2024-01-01T09:00:00Z"}),
            ],
        )
        .await;

    let messages = ChatService::new(shared(&backend)).list_messages("chat-1").await;
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);
}

#[tokio::test]
async fn blank_message_makes_no_call() {
    let backend = marketplace_backend().await;
    signed_in_member(&backend, "ada@example.com").await;
    let chat = ChatService::new(shared(&backend));

    let before = backend.call_count().await;
    let sent = chat.send_message("chat-1", "   ").await.expect("not an error");

    assert!(sent.is_none());
    assert_eq!(backend.call_count().await, before);
    assert!(backend.rows("messages").await.is_empty());
}

#[tokio::test]
async fn sent_message_is_trimmed_and_attributed() {
    let backend = marketplace_backend().await;
    let (session, _) = signed_in_member(&backend, "ada@example.com").await;

    let message = ChatService::new(shared(&backend))
        .send_message("chat-1", "  is this still available?  ")
        .await
        .expect("send")
        .expect("non-blank message is stored");

    assert_eq!(message.content, "is this still available?");
    assert_eq!(message.sender_id, session.user.id);
    assert_eq!(message.chat_id, "chat-1");
}

#[tokio::test]
async fn sending_requires_a_session() {
    let backend = marketplace_backend().await;
    signed_in_member(&backend, "ada@example.com").await;
    backend.sign_out().await.expect("sign out");

    let err = ChatService::new(shared(&backend))
        .send_message("chat-1", "hello")
        .await
        .expect_err("signed out");
    assert!(matches!(err, MarketError::NotAuthenticated));
}

#[tokio::test]
async fn subscription_only_delivers_its_own_chat() {
    let backend = marketplace_backend().await;
    signed_in_member(&backend, "ada@example.com").await;
    let chat = ChatService::new(shared(&backend));

    let mut feed = chat.subscribe("chat-1").await.expect("subscribe");
    assert!(backend
        .calls()
        .await
        .contains(&"realtime:realtime:chat:chat-1".to_string()));

    chat.send_message("chat-2", "not for you").await.expect("send");
    chat.send_message("chat-1", "hello").await.expect("send");

    let received = timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("message should arrive")
        .expect("feed open");
    assert_eq!(received.chat_id, "chat-1");
    assert_eq!(received.content, "hello");
}
