//! Delivery of invite codes by email.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bazaar_backend::Backend;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{MarketError, MarketResult};

/// The message handed to a mailer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteEmail {
    pub email: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub inviter_name: Option<String>,
}

#[async_trait]
pub trait InviteMailer: Send + Sync {
    async fn send_invite(&self, message: &InviteEmail) -> MarketResult<()>;
}

/// Logs the message instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl InviteMailer for LogMailer {
    async fn send_invite(&self, message: &InviteEmail) -> MarketResult<()> {
        info!(
            email = %message.email,
            code = %message.code,
            inviter = message.inviter_name.as_deref().unwrap_or("Someone"),
            "Would send email to {} with code {}",
            message.email,
            message.code
        );
        Ok(())
    }
}

/// Posts `{email, code}` to a delivery endpoint with the signed-in session's token.
pub struct HttpInviteMailer {
    client: Client,
    endpoint: String,
    backend: Arc<dyn Backend>,
}

impl HttpInviteMailer {
    pub fn new(
        endpoint: impl Into<String>,
        backend: Arc<dyn Backend>,
        timeout: Duration,
    ) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MarketError::mail(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            backend,
        })
    }
}

#[async_trait]
impl InviteMailer for HttpInviteMailer {
    async fn send_invite(&self, message: &InviteEmail) -> MarketResult<()> {
        let session = self
            .backend
            .session()
            .await
            .ok_or(MarketError::NotAuthenticated)?;

        debug!(endpoint = %self.endpoint, email = %message.email, "requesting invite delivery");
        self.client
            .post(&self.endpoint)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "email": message.email, "code": message.code }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| MarketError::mail(err.to_string()))?;

        Ok(())
    }
}
