//! Session handling for the signed-in member.

use std::sync::Arc;

use bazaar_backend::{AuthEvent, Backend, Session, SignUpOutcome, SignUpRequest};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::types::MarketResult;
use crate::utils::Validator;

pub struct AuthService {
    backend: Arc<dyn Backend>,
}

impl AuthService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> MarketResult<Session> {
        Validator::email(email)?;
        let session = self.backend.sign_in(email.trim(), password).await?;
        Ok(session)
    }

    /// Plain signup without an invite code.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> MarketResult<SignUpOutcome> {
        Validator::email(email)?;
        Validator::password(password)?;

        let metadata = match full_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => json!({ "full_name": name }),
            None => json!({}),
        };
        let outcome = self
            .backend
            .sign_up(SignUpRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
                metadata,
            })
            .await?;
        Ok(outcome)
    }

    pub async fn sign_out(&self) -> MarketResult<()> {
        match self.backend.sign_out().await {
            Ok(()) => {
                info!("signed out");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "sign out failed");
                Err(err.into())
            }
        }
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.backend.session().await
    }

    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.backend.on_auth_state_change()
    }
}
