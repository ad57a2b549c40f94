//! Realtime change feed.
//!
//! The hosted feed speaks the Phoenix channel protocol over a websocket:
//! a client joins `realtime:{name}` with a `postgres_changes` config, keeps
//! the socket alive with `heartbeat` frames on the `phoenix` topic and
//! receives `postgres_changes` events carrying the changed row.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::BackendResult;
use crate::query::Filter;

pub const HEARTBEAT_TOPIC: &str = "phoenix";
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    pub fn covers(self, other: ChangeKind) -> bool {
        self == ChangeKind::All || self == other
    }
}

/// What a subscription listens to: one table, one event kind, an optional row filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFilter {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub event: ChangeKind,
    pub filter: Option<Filter>,
}

impl ChannelFilter {
    pub fn new(table: impl Into<String>, event: ChangeKind) -> Self {
        let table = table.into();
        Self {
            name: table.clone(),
            schema: "public".to_string(),
            table,
            event,
            filter: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}", self.name)
    }

    /// Whether a change on `table` with row `record` belongs to this channel.
    pub fn accepts(&self, table: &str, kind: ChangeKind, record: &Value) -> bool {
        self.table == table
            && self.event.covers(kind)
            && self.filter.as_ref().map_or(true, |filter| filter.matches(record))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
    pub old_record: Option<Value>,
}

/// Live subscription handle. Dropping it tears down the underlying feed.
///
/// Feeds built with a shutdown signal are asked to stop and leave their
/// channel cleanly; the rest are aborted.
pub struct Subscription {
    receiver: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task,
            shutdown: None,
        }
    }

    pub fn with_shutdown(
        receiver: mpsc::Receiver<ChangeEvent>,
        task: JoinHandle<()>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            receiver,
            task,
            shutdown: Some(shutdown),
        }
    }

    /// Next change, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        match self.shutdown.take() {
            Some(shutdown) if !self.task.is_finished() => {
                // The task exits on its own once the signal lands.
                if shutdown.send(()).is_err() {
                    self.task.abort();
                }
            }
            _ => self.task.abort(),
        }
    }
}

#[async_trait]
pub trait RealtimeApi: Send + Sync {
    async fn subscribe(&self, channel: ChannelFilter) -> BackendResult<Subscription>;
}

/// One Phoenix protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    pub fn join(channel: &ChannelFilter, access_token: &str, reference: u64) -> Self {
        let mut change = json!({
            "event": channel.event,
            "schema": channel.schema,
            "table": channel.table,
        });
        if let Some(filter) = &channel.filter {
            change["filter"] = Value::String(filter.to_string());
        }

        Self {
            topic: channel.topic(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": { "postgres_changes": [change] },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave(channel: &ChannelFilter, reference: u64) -> Self {
        Self {
            topic: channel.topic(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// `Some(reason)` when this is an error reply to a join or push.
    pub fn error_reply(&self) -> Option<String> {
        if self.event == "phx_error" {
            return Some("channel crashed".to_string());
        }
        if self.event != "phx_reply"
            || self.payload.get("status").and_then(Value::as_str) != Some("error")
        {
            return None;
        }
        Some(
            self.payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .unwrap_or("join rejected")
                .to_string(),
        )
    }

    /// Decode a `postgres_changes` frame into a change event.
    pub fn into_change(self) -> Option<ChangeEvent> {
        if self.event != "postgres_changes" {
            return None;
        }

        let data = self.payload.get("data")?;
        let table = data.get("table")?.as_str()?.to_string();
        let kind: ChangeKind = serde_json::from_value(data.get("type")?.clone()).ok()?;
        let record = data.get("record").cloned().unwrap_or(Value::Null);
        let old_record = data.get("old_record").cloned();

        Some(ChangeEvent {
            table,
            kind,
            record,
            old_record,
        })
    }
}
