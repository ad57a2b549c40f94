//! Websocket behaviour of `RestBackend::subscribe` against a local Phoenix-style server.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use bazaar_backend::{ChangeKind, ChannelFilter, Filter, RealtimeApi, RestBackend};
use bazaar_config::BackendConfig;

const WAIT: Duration = Duration::from_secs(2);

fn backend_for(addr: SocketAddr) -> RestBackend {
    let config = BackendConfig {
        url: format!("http://{addr}/"),
        anon_key: "anon-key".to_string(),
        service_role_key: None,
        request_timeout_seconds: 2,
    };
    RestBackend::new(&config).expect("client should build")
}

fn chat_channel(chat_id: &str) -> ChannelFilter {
    ChannelFilter::new("messages", ChangeKind::Insert)
        .named(format!("chat:{chat_id}"))
        .filter(Filter::Eq("chat_id".to_string(), chat_id.to_string()))
}

fn insert_frame(topic: &str, chat_id: &str, content: &str) -> Value {
    json!({
        "topic": topic,
        "event": "postgres_changes",
        "payload": {
            "data": {
                "table": "messages",
                "type": "INSERT",
                "record": { "chat_id": chat_id, "content": content }
            }
        },
        "ref": null
    })
}

async fn next_frame(socket: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(message) = socket.next().await {
        match message.ok()? {
            Message::Text(text) => return serde_json::from_str(&text).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

async fn accept(listener: TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = listener.accept().await.expect("client should connect");
    accept_async(tcp).await.expect("websocket handshake")
}

#[tokio::test]
async fn joins_with_filter_and_forwards_only_matching_changes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (joined, join_frame) = oneshot::channel();

    let server = tokio::spawn(async move {
        let mut socket = accept(listener).await;
        let join = next_frame(&mut socket).await.expect("join frame");
        let topic = join["topic"].as_str().unwrap_or_default().to_string();
        let _ = joined.send(join);

        let rejection = json!({
            "topic": topic,
            "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } },
            "ref": "1"
        });
        for frame in [
            insert_frame(&topic, "chat-2", "elsewhere"),
            insert_frame(&topic, "chat-1", "hello"),
            rejection,
        ] {
            socket
                .send(Message::Text(frame.to_string()))
                .await
                .expect("server send");
        }
        while next_frame(&mut socket).await.is_some() {}
    });

    let backend = backend_for(addr);
    let mut subscription = backend
        .subscribe(chat_channel("chat-1"))
        .await
        .expect("subscribe should connect");

    let join = join_frame.await.expect("server saw the join");
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], "realtime:chat:chat-1");
    let change = &join["payload"]["config"]["postgres_changes"][0];
    assert_eq!(change["table"], "messages");
    assert_eq!(change["event"], "INSERT");
    assert_eq!(change["filter"], "chat_id=eq.chat-1");
    assert_eq!(join["payload"]["access_token"], "anon-key");

    let forwarded = timeout(WAIT, subscription.next())
        .await
        .expect("change should arrive")
        .expect("feed still open");
    assert_eq!(forwarded.kind, ChangeKind::Insert);
    assert_eq!(forwarded.record["content"], "hello");

    let closed = timeout(WAIT, subscription.next())
        .await
        .expect("feed should close");
    assert!(closed.is_none());

    timeout(WAIT, server)
        .await
        .expect("server should finish")
        .expect("server task");
}

#[tokio::test]
async fn dropping_the_subscription_leaves_the_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        let mut socket = accept(listener).await;
        let mut events = Vec::new();
        while let Some(frame) = next_frame(&mut socket).await {
            events.push((
                frame["event"].as_str().unwrap_or_default().to_string(),
                frame["topic"].as_str().unwrap_or_default().to_string(),
            ));
        }
        events
    });

    let backend = backend_for(addr);
    let subscription = backend
        .subscribe(chat_channel("chat-9"))
        .await
        .expect("subscribe should connect");
    drop(subscription);

    let events = timeout(WAIT, server)
        .await
        .expect("socket should close")
        .expect("server task");
    assert_eq!(events.first().map(|(event, _)| event.as_str()), Some("phx_join"));
    assert!(events
        .iter()
        .any(|(event, topic)| event == "phx_leave" && topic == "realtime:chat:chat-9"));
}
