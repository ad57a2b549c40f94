//! Shared application state for the gateway

use std::sync::Arc;

use bazaar_backend::Backend;
use bazaar_market::{InviteMailer, LogMailer, ProfileService};

/// Services the HTTP handlers need
#[derive(Clone)]
pub struct GatewayState {
    /// Used to resolve bearer tokens into principals
    pub backend: Arc<dyn Backend>,
    pub profiles: Arc<ProfileService>,
    pub mailer: Arc<dyn InviteMailer>,
    pub backend_url: Option<String>,
}

impl GatewayState {
    pub fn new(
        backend: Arc<dyn Backend>,
        profiles: Arc<ProfileService>,
        mailer: Arc<dyn InviteMailer>,
    ) -> Self {
        Self {
            backend,
            profiles,
            mailer,
            backend_url: None,
        }
    }

    /// Record the backend base URL reported by the health probe.
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// State whose mailer only logs, as the hosted deployment does today.
    pub fn with_log_mailer(backend: Arc<dyn Backend>, default_invites: i32) -> Self {
        let profiles = Arc::new(ProfileService::new(backend.clone(), default_invites));
        Self::new(backend, profiles, Arc::new(LogMailer))
    }
}
