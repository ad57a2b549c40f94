//! In-memory backend used by service tests and local development.
//!
//! Mirrors the observable behaviour of the hosted platform that the
//! services rely on: generated ids and timestamps, unique constraints
//! reported with the Postgres `23505` code, registrable remote procedures,
//! password sessions, object storage and change broadcasts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AuthApi, AuthEvent, AuthUser, Session, SignUpOutcome, SignUpRequest};
use crate::data::DataApi;
use crate::error::{BackendError, BackendResult, UNIQUE_VIOLATION};
use crate::query::Query;
use crate::realtime::{ChangeEvent, ChangeKind, ChannelFilter, RealtimeApi, Subscription};
use crate::storage::{StorageApi, UploadOptions};

const CHANGE_BUFFER: usize = 256;

/// Table contents handed to remote procedures.
#[derive(Debug, Default)]
pub struct Tables {
    rows: HashMap<String, Vec<Value>>,
}

impl Tables {
    pub fn rows(&self, table: &str) -> &[Value] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows_mut(&mut self, table: &str) -> &mut Vec<Value> {
        self.rows.entry(table.to_string()).or_default()
    }

    pub fn find_mut(&mut self, query: &Query) -> Option<&mut Value> {
        self.rows_mut(&query.table)
            .iter_mut()
            .find(|row| query.matches(row))
    }
}

pub type Procedure = Arc<dyn Fn(&mut Tables, Value) -> BackendResult<Value> + Send + Sync>;

#[derive(Clone)]
struct StoredUser {
    user: AuthUser,
    password: String,
}

#[derive(Clone)]
struct InjectedFailure {
    status: u16,
    code: Option<String>,
    message: String,
}

#[derive(Clone)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
    unique: Arc<RwLock<HashMap<String, Vec<Vec<String>>>>>,
    procedures: Arc<RwLock<HashMap<String, Procedure>>>,
    users: Arc<RwLock<Vec<StoredUser>>>,
    tokens: Arc<RwLock<HashMap<String, String>>>,
    session: Arc<RwLock<Option<Session>>>,
    objects: Arc<RwLock<HashMap<String, (Bytes, String)>>>,
    failures: Arc<RwLock<HashMap<String, InjectedFailure>>>,
    calls: Arc<RwLock<Vec<String>>>,
    changes: broadcast::Sender<ChangeEvent>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        let (auth_events, _) = broadcast::channel(16);
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            unique: Arc::new(RwLock::new(HashMap::new())),
            procedures: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(Vec::new())),
            tokens: Arc::new(RwLock::new(HashMap::new())),
            session: Arc::new(RwLock::new(None)),
            objects: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            changes,
            auth_events,
        }
    }

    /// Reject inserts that repeat the given column combination.
    pub async fn add_unique(&self, table: &str, columns: &[&str]) {
        self.unique
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|column| column.to_string()).collect());
    }

    pub async fn register_procedure<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&mut Tables, Value) -> BackendResult<Value> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .await
            .insert(name.to_string(), Arc::new(procedure));
    }

    /// Store rows without recording a call or broadcasting a change.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        for row in rows {
            tables.rows_mut(table).push(complete_row(row));
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().await.rows(table).to_vec()
    }

    /// Create a principal directly, bypassing signup.
    pub async fn create_user(&self, email: &str, password: &str, metadata: Value) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            metadata,
            created_at: Some(Utc::now()),
        };
        self.users.write().await.push(StoredUser {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    pub async fn users(&self) -> Vec<AuthUser> {
        self.users
            .read()
            .await
            .iter()
            .map(|stored| stored.user.clone())
            .collect()
    }

    pub async fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make every call to `operation` (e.g. `update:items`) fail with an API error.
    pub async fn fail_on(&self, operation: &str, status: u16, code: Option<&str>, message: &str) {
        self.failures.write().await.insert(
            operation.to_string(),
            InjectedFailure {
                status,
                code: code.map(str::to_string),
                message: message.to_string(),
            },
        );
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Operations performed so far, as `kind:target` strings.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn record(&self, operation: String) -> BackendResult<()> {
        debug!(operation = %operation, "memory backend call");
        let failure = self.failures.read().await.get(&operation).cloned();
        self.calls.write().await.push(operation);

        match failure {
            Some(failure) => Err(BackendError::api(
                failure.status,
                failure.code,
                failure.message,
            )),
            None => Ok(()),
        }
    }

    async fn check_unique(&self, tables: &Tables, table: &str, row: &Value) -> BackendResult<()> {
        let unique = self.unique.read().await;
        let Some(constraints) = unique.get(table) else {
            return Ok(());
        };

        for columns in constraints {
            let clash = tables.rows(table).iter().any(|existing| {
                columns
                    .iter()
                    .all(|column| existing.get(column) == row.get(column) && row.get(column).is_some())
            });
            if clash {
                return Err(BackendError::api(
                    409,
                    Some(UNIQUE_VIOLATION.to_string()),
                    format!(
                        "duplicate key value violates unique constraint \"{table}_{}_key\"",
                        columns.join("_")
                    ),
                ));
            }
        }
        Ok(())
    }

    fn publish(&self, table: &str, kind: ChangeKind, record: Value, old_record: Option<Value>) {
        let _ = self.changes.send(ChangeEvent {
            table: table.to_string(),
            kind,
            record,
            old_record,
        });
    }

    async fn issue_session(&self, user: AuthUser) -> Session {
        let token = format!("memory-{}", Uuid::new_v4());
        self.tokens
            .write()
            .await
            .insert(token.clone(), user.id.clone());

        let session = Session {
            access_token: token,
            refresh_token: None,
            expires_in: Some(3_600),
            user,
        };
        *self.session.write().await = Some(session.clone());
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
        session
    }
}

fn complete_row(mut row: Value) -> Value {
    if let Value::Object(fields) = &mut row {
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    }
    row
}

fn merge(row: &mut Value, changes: &Value) {
    if let (Value::Object(fields), Value::Object(updates)) = (row, changes) {
        for (key, value) in updates {
            fields.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_up(&self, request: SignUpRequest) -> BackendResult<SignUpOutcome> {
        self.record("auth:sign_up".to_string()).await?;

        let exists = self
            .users
            .read()
            .await
            .iter()
            .any(|stored| stored.user.email.as_deref() == Some(request.email.as_str()));
        if exists {
            return Err(BackendError::api(422, None, "User already registered"));
        }

        let user = self
            .create_user(&request.email, &request.password, request.metadata)
            .await;
        let session = self.issue_session(user.clone()).await;
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        self.record("auth:sign_in".to_string()).await?;

        let user = self
            .users
            .read()
            .await
            .iter()
            .find(|stored| stored.user.email.as_deref() == Some(email) && stored.password == password)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| BackendError::api(400, None, "Invalid login credentials"))?;

        Ok(self.issue_session(user).await)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.record("auth:sign_out".to_string()).await?;
        if let Some(session) = self.session.write().await.take() {
            self.tokens.write().await.remove(&session.access_token);
            let _ = self.auth_events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        self.record("auth:get_user".to_string()).await?;

        let user_id = self
            .tokens
            .read()
            .await
            .get(access_token)
            .cloned()
            .ok_or_else(|| BackendError::api(401, None, "invalid JWT"))?;

        self.users
            .read()
            .await
            .iter()
            .find(|stored| stored.user.id == user_id)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| BackendError::api(404, None, "User not found"))
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl DataApi for MemoryBackend {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>> {
        self.record(format!("select:{}", query.table)).await?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .rows(&query.table)
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        query.arrange(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        self.record(format!("insert:{table}")).await?;

        let row = complete_row(row);
        let mut tables = self.tables.write().await;
        self.check_unique(&tables, table, &row).await?;
        tables.rows_mut(table).push(row.clone());
        drop(tables);

        self.publish(table, ChangeKind::Insert, row.clone(), None);
        Ok(row)
    }

    async fn update(&self, query: &Query, changes: Value) -> BackendResult<Vec<Value>> {
        self.record(format!("update:{}", query.table)).await?;

        let mut updated = Vec::new();
        let mut tables = self.tables.write().await;
        for row in tables.rows_mut(&query.table).iter_mut() {
            if query.matches(row) {
                let old = row.clone();
                merge(row, &changes);
                updated.push((old, row.clone()));
            }
        }
        drop(tables);

        for (old, new) in &updated {
            self.publish(&query.table, ChangeKind::Update, new.clone(), Some(old.clone()));
        }
        Ok(updated.into_iter().map(|(_, new)| new).collect())
    }

    async fn delete(&self, query: &Query) -> BackendResult<Vec<Value>> {
        self.record(format!("delete:{}", query.table)).await?;

        let mut tables = self.tables.write().await;
        let rows = tables.rows_mut(&query.table);
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|row| query.matches(row));
        *rows = kept;
        drop(tables);

        for row in &removed {
            self.publish(&query.table, ChangeKind::Delete, Value::Null, Some(row.clone()));
        }
        Ok(removed)
    }

    async fn rpc(&self, function: &str, args: Value) -> BackendResult<Value> {
        self.record(format!("rpc:{function}")).await?;

        let procedure = self
            .procedures
            .read()
            .await
            .get(function)
            .cloned()
            .ok_or_else(|| {
                BackendError::api(
                    404,
                    Some("PGRST202".to_string()),
                    format!("Could not find the function public.{function}"),
                )
            })?;

        let mut tables = self.tables.write().await;
        procedure(&mut *tables, args)
    }
}

#[async_trait]
impl StorageApi for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: UploadOptions,
    ) -> BackendResult<String> {
        let key = format!("{bucket}/{path}");
        self.record(format!("storage:upload:{key}")).await?;

        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) && !options.upsert {
            return Err(BackendError::api(409, Some("Duplicate".to_string()), "The resource already exists"));
        }
        objects.insert(key, (body, options.content_type));
        Ok(path.to_string())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<()> {
        self.record(format!("storage:remove:{bucket}")).await?;

        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(&format!("{bucket}/{path}"));
        }
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_seconds: u64,
    ) -> BackendResult<String> {
        let key = format!("{bucket}/{path}");
        self.record(format!("storage:sign:{key}")).await?;

        if !self.objects.read().await.contains_key(&key) {
            return Err(BackendError::api(404, None, "Object not found"));
        }
        Ok(format!(
            "memory://storage/{key}?token={}&expires_in={expires_in_seconds}",
            Uuid::new_v4()
        ))
    }
}

#[async_trait]
impl RealtimeApi for MemoryBackend {
    async fn subscribe(&self, channel: ChannelFilter) -> BackendResult<Subscription> {
        self.record(format!("realtime:{}", channel.topic())).await?;

        let mut changes = self.changes.subscribe();
        let (sender, receiver) = mpsc::channel(CHANGE_BUFFER);
        let task = tokio::spawn(async move {
            while let Ok(change) = changes.recv().await {
                let record = change.old_record.as_ref().filter(|_| change.kind == ChangeKind::Delete);
                let row = record.unwrap_or(&change.record);
                if !channel.accepts(&change.table, change.kind, row) {
                    continue;
                }
                if sender.send(change).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(receiver, task))
    }
}

/// Convenience for procedures: read a string argument.
pub fn arg_str<'a>(args: &'a Value, name: &str) -> BackendResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::api(400, None, format!("missing argument {name}")))
}
