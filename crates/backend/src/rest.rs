//! HTTP implementation of the backend surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use bazaar_config::BackendConfig;

use crate::auth::{AuthApi, AuthEvent, AuthUser, Session, SignUpOutcome, SignUpRequest};
use crate::data::DataApi;
use crate::error::{ApiErrorBody, BackendError, BackendResult};
use crate::query::Query;
use crate::realtime::{
    ChannelFilter, PhoenixMessage, RealtimeApi, Subscription, HEARTBEAT_INTERVAL_SECS,
};
use crate::storage::{StorageApi, UploadOptions};

const PREFER_REPRESENTATION: &str = "return=representation";
const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";
const SUBSCRIPTION_BUFFER: usize = 64;
const AUTH_EVENT_BUFFER: usize = 16;

/// Talks to the hosted platform over HTTPS and websockets.
///
/// The public API key identifies the project; requests carry the signed-in
/// principal's access token when a session exists and the key otherwise.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    session: Arc<RwLock<Option<Session>>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        Self::with_api_key(config, config.anon_key.clone())
    }

    /// Build a client that authenticates with a different key, e.g. the service role.
    pub fn with_api_key(config: &BackendConfig, api_key: impl Into<String>) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_BUFFER);

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: api_key.into(),
            session: Arc::new(RwLock::new(None)),
            auth_events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adopt a session obtained elsewhere.
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let _ = self.auth_events.send(AuthEvent::SignedIn(session));
    }

    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.bearer().await;
        self.request_with_token(method, path, &bearer)
    }

    fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let err = parsed.into_error(status);
        debug!(status = status.as_u16(), code = ?err.code(), "backend request rejected");
        Err(err)
    }

    async fn json_or_null(response: Response) -> BackendResult<Value> {
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn rows(value: Value) -> Vec<Value> {
        match value {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            row => vec![row],
        }
    }

    fn realtime_url(&self) -> BackendResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| BackendError::realtime("cannot derive websocket url"))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VERSION);
        Ok(url)
    }
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[async_trait]
impl AuthApi for RestBackend {
    async fn sign_up(&self, request: SignUpRequest) -> BackendResult<SignUpOutcome> {
        let response = self
            .send(
                self.request(Method::POST, "/auth/v1/signup")
                    .await
                    .json(&request),
            )
            .await?;
        let body: Value = response.json().await?;

        // With email confirmation enabled the platform returns the bare user.
        let outcome = if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            }
        } else {
            let user = body.get("user").cloned().unwrap_or(body);
            SignUpOutcome {
                user: serde_json::from_value(user)?,
                session: None,
            }
        };

        if let Some(session) = &outcome.session {
            self.set_session(session.clone()).await;
        }
        info!(user_id = %outcome.user.id, "principal signed up");
        Ok(outcome)
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        let request = self
            .request_with_token(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                &self.api_key,
            )
            .json(&json!({ "email": email, "password": password }));
        let session: Session = self.send(request).await?.json().await?;

        self.set_session(session.clone()).await;
        info!(user_id = %session.user.id, "principal signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let _ = self.auth_events.send(AuthEvent::SignedOut);

        let request = self.request_with_token(Method::POST, "/auth/v1/logout", &session.access_token);
        self.send(request).await?;
        info!(user_id = %session.user.id, "principal signed out");
        Ok(())
    }

    async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        let request = self.request_with_token(Method::GET, "/auth/v1/user", access_token);
        Ok(self.send(request).await?.json().await?)
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl DataApi for RestBackend {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>> {
        debug!(table = %query.table, filters = query.filters.len(), "select");
        let request = self
            .request(Method::GET, &format!("/rest/v1/{}", query.table))
            .await
            .query(&query.to_params(true));
        let body = Self::json_or_null(self.send(request).await?).await?;
        Ok(Self::rows(body))
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        debug!(table, "insert");
        let request = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row);
        let body = Self::json_or_null(self.send(request).await?).await?;
        Self::rows(body)
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }

    async fn update(&self, query: &Query, changes: Value) -> BackendResult<Vec<Value>> {
        debug!(table = %query.table, filters = query.filters.len(), "update");
        let request = self
            .request(Method::PATCH, &format!("/rest/v1/{}", query.table))
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&query.to_params(false))
            .json(&changes);
        let body = Self::json_or_null(self.send(request).await?).await?;
        Ok(Self::rows(body))
    }

    async fn delete(&self, query: &Query) -> BackendResult<Vec<Value>> {
        debug!(table = %query.table, filters = query.filters.len(), "delete");
        let request = self
            .request(Method::DELETE, &format!("/rest/v1/{}", query.table))
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&query.to_params(false));
        let body = Self::json_or_null(self.send(request).await?).await?;
        Ok(Self::rows(body))
    }

    async fn rpc(&self, function: &str, args: Value) -> BackendResult<Value> {
        debug!(function, "rpc");
        let request = self
            .request(Method::POST, &format!("/rest/v1/rpc/{function}"))
            .await
            .json(&args);
        Self::json_or_null(self.send(request).await?).await
    }
}

#[async_trait]
impl StorageApi for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: UploadOptions,
    ) -> BackendResult<String> {
        debug!(bucket, path, bytes = body.len(), "uploading object");
        let request = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .await
            .header(header::CONTENT_TYPE, options.content_type)
            .header(
                header::CACHE_CONTROL,
                format!("max-age={}", options.cache_control),
            )
            .header("x-upsert", options.upsert.to_string())
            .body(body);
        self.send(request).await?;
        Ok(path.to_string())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<()> {
        debug!(bucket, count = paths.len(), "removing objects");
        let request = self
            .request(Method::DELETE, &format!("/storage/v1/object/{bucket}"))
            .await
            .json(&json!({ "prefixes": paths }));
        self.send(request).await?;
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_seconds: u64,
    ) -> BackendResult<String> {
        let request = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/sign/{bucket}/{path}"),
            )
            .await
            .json(&json!({ "expiresIn": expires_in_seconds }));
        let signed: SignedUrlResponse = self.send(request).await?.json().await?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

#[async_trait]
impl RealtimeApi for RestBackend {
    async fn subscribe(&self, channel: ChannelFilter) -> BackendResult<Subscription> {
        let url = self.realtime_url()?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|err| BackendError::realtime(err.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let join = PhoenixMessage::join(&channel, &self.bearer().await, 1);
        sink.send(WsMessage::Text(serde_json::to_string(&join)?))
            .await
            .map_err(|err| BackendError::realtime(err.to_string()))?;
        info!(topic = %channel.topic(), "realtime channel joined");

        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (shutdown, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut heartbeat =
                tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
            heartbeat.tick().await;
            let mut reference: u64 = 1;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = heartbeat.tick() => {
                        reference += 1;
                        let frame = PhoenixMessage::heartbeat(reference);
                        let Ok(text) = serde_json::to_string(&frame) else { break };
                        if sink.send(WsMessage::Text(text)).await.is_err() {
                            warn!(topic = %channel.topic(), "realtime heartbeat failed");
                            break;
                        }
                    }
                    incoming = stream.next() => {
                        let text = match incoming {
                            Some(Ok(WsMessage::Text(text))) => text,
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Ok(_)) => continue,
                            Some(Err(err)) => {
                                warn!(topic = %channel.topic(), error = %err, "realtime socket error");
                                break;
                            }
                        };

                        let Ok(frame) = serde_json::from_str::<PhoenixMessage>(&text) else {
                            debug!("ignoring undecodable realtime frame");
                            continue;
                        };
                        if let Some(reason) = frame.error_reply() {
                            warn!(topic = %channel.topic(), reason = %reason, "realtime channel rejected");
                            break;
                        }
                        if let Some(change) = frame.into_change() {
                            if !channel.accepts(&change.table, change.kind, &change.record) {
                                continue;
                            }
                            if sender.send(change).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }

            reference += 1;
            if let Ok(text) = serde_json::to_string(&PhoenixMessage::leave(&channel, reference)) {
                let _ = sink.send(WsMessage::Text(text)).await;
            }
            let _ = sink.close().await;
            debug!(topic = %channel.topic(), "realtime channel closed");
        });

        Ok(Subscription::with_shutdown(receiver, task, shutdown))
    }
}
