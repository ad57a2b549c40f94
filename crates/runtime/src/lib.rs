use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bazaar_backend::{Backend, RestBackend};
use bazaar_config::AppConfig;
use bazaar_gateway::GatewayState;
use bazaar_market::{
    AuthService, ChatService, FavoriteService, HttpInviteMailer, ImageService, InviteMailer,
    InviteService, ItemService, LogMailer, ProfileService, PurchaseService,
};
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Every marketplace service wired to one backend handle.
#[derive(Clone)]
pub struct BackendServices {
    pub backend: Arc<dyn Backend>,
    pub mailer: Arc<dyn InviteMailer>,
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub invites: Arc<InviteService>,
    pub images: Arc<ImageService>,
    pub items: Arc<ItemService>,
    pub favorites: Arc<FavoriteService>,
    pub chat: Arc<ChatService>,
    pub purchases: Arc<PurchaseService>,
    /// Configured backend base URL, empty when unset
    pub backend_url: String,
}

impl BackendServices {
    /// Validate the configuration and connect to the hosted backend.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let backend: Arc<dyn Backend> = Arc::new(
            RestBackend::new(&config.backend).context("failed to build backend client")?,
        );
        info!(url = config.backend.base_url(), "backend client ready");

        Self::with_backend(backend, config)
    }

    /// Wire the services around an existing backend.
    pub fn with_backend(backend: Arc<dyn Backend>, config: &AppConfig) -> Result<Self> {
        let mailer: Arc<dyn InviteMailer> = match &config.invites.mail_endpoint {
            Some(endpoint) => {
                let timeout = Duration::from_secs(config.backend.request_timeout_seconds);
                let mailer = HttpInviteMailer::new(endpoint.clone(), backend.clone(), timeout)
                    .context("failed to build invite mailer")?;
                info!(%endpoint, "invite emails delivered over http");
                Arc::new(mailer)
            }
            None => {
                info!("no mail endpoint configured, invite emails are logged only");
                Arc::new(LogMailer)
            }
        };

        let images = Arc::new(ImageService::new(backend.clone(), config.storage.clone()));
        let items = Arc::new(ItemService::new(backend.clone(), images.clone()));

        Ok(Self {
            auth: Arc::new(AuthService::new(backend.clone())),
            profiles: Arc::new(ProfileService::new(
                backend.clone(),
                config.invites.default_quota,
            )),
            invites: Arc::new(InviteService::new(
                backend.clone(),
                mailer.clone(),
                config.invites.clone(),
            )),
            favorites: Arc::new(FavoriteService::new(backend.clone())),
            chat: Arc::new(ChatService::new(backend.clone())),
            purchases: Arc::new(PurchaseService::new(backend.clone(), items.clone())),
            images,
            items,
            mailer,
            backend,
            backend_url: config.backend.base_url().to_string(),
        })
    }

    /// State for the HTTP gateway. Invite emails from the gateway are only logged.
    pub fn gateway_state(&self) -> GatewayState {
        let state = GatewayState::new(
            self.backend.clone(),
            self.profiles.clone(),
            Arc::new(LogMailer),
        );
        if self.backend_url.is_empty() {
            state
        } else {
            state.with_backend_url(self.backend_url.clone())
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
