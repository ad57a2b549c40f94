use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::BackendResult;

/// An authenticated principal as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata supplied at signup (`full_name`, `invite_code`).
    #[serde(default, alias = "user_metadata")]
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "data")]
    pub metadata: Value,
}

/// Result of a signup call. The session is absent when the platform
/// requires email confirmation before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, request: SignUpRequest) -> BackendResult<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session>;

    async fn sign_out(&self) -> BackendResult<()>;

    /// The current session, if any. Never performs a network call.
    async fn session(&self) -> Option<Session>;

    /// Resolve the principal behind an access token issued to another client.
    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser>;

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}
