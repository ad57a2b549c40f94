use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "bazaar.toml",
    "config/bazaar.toml",
    "crates/config/bazaar.toml",
    "../bazaar.toml",
    "../config/bazaar.toml",
];

/// Environment variables consulted when the backend section is left empty.
const BACKEND_URL_FALLBACK_ENV: &str = "SUPABASE_URL";
const BACKEND_KEY_FALLBACK_ENV: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub invites: InviteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

/// Connection settings for the hosted backend.
///
/// ```
/// use bazaar_config::BackendConfig;
///
/// let backend = BackendConfig::default();
/// assert!(backend.url.is_empty());
/// assert_eq!(backend.request_timeout_seconds, 30);
/// assert!(backend.service_role_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default)]
    pub service_role_key: Option<String>,
    #[serde(default = "BackendConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl BackendConfig {
    const fn default_request_timeout() -> u64 {
        30
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_role_key: None,
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_bucket")]
    pub bucket: String,
    #[serde(default = "StorageConfig::default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,
    #[serde(default = "StorageConfig::default_max_images")]
    pub max_images: usize,
    #[serde(default = "StorageConfig::default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl StorageConfig {
    fn default_bucket() -> String {
        "items-images".to_string()
    }

    const fn default_signed_url_ttl() -> u64 {
        3_600
    }

    const fn default_max_images() -> usize {
        3
    }

    const fn default_max_image_bytes() -> usize {
        5 * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: Self::default_bucket(),
            signed_url_ttl_seconds: Self::default_signed_url_ttl(),
            max_images: Self::default_max_images(),
            max_image_bytes: Self::default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteConfig {
    #[serde(default = "InviteConfig::default_code_length")]
    pub code_length: usize,
    #[serde(default = "InviteConfig::default_expiry_days")]
    pub expiry_days: i64,
    #[serde(default = "InviteConfig::default_quota")]
    pub default_quota: i32,
    /// Endpoint receiving `{email, code}` for delivery. Unset means log only.
    #[serde(default)]
    pub mail_endpoint: Option<String>,
}

impl InviteConfig {
    const fn default_code_length() -> usize {
        6
    }

    const fn default_expiry_days() -> i64 {
        7
    }

    const fn default_quota() -> i32 {
        3
    }
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            code_length: Self::default_code_length(),
            expiry_days: Self::default_expiry_days(),
            default_quota: Self::default_quota(),
            mail_endpoint: None,
        }
    }
}

impl AppConfig {
    /// Reject configurations that cannot reach the backend.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.url.trim().is_empty() {
            bail!("missing backend url (set backend.url or {BACKEND_URL_FALLBACK_ENV})");
        }
        if self.backend.anon_key.trim().is_empty() {
            bail!("missing backend api key (set backend.anon_key or {BACKEND_KEY_FALLBACK_ENV})");
        }
        if self.storage.max_images == 0 {
            bail!("storage.max_images must be at least 1");
        }
        if self.invites.code_length == 0 {
            bail!("invites.code_length must be at least 1");
        }
        Ok(())
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use bazaar_config::load;
///
/// std::env::remove_var("BAZAAR_CONFIG");
/// std::env::set_var("BAZAAR__BACKEND__URL", "https://project.example.co");
/// std::env::set_var("BAZAAR__BACKEND__ANON_KEY", "public-anon-key");
///
/// let config = load().expect("configuration should load");
/// assert_eq!(config.backend.base_url(), "https://project.example.co");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("backend.url", defaults.backend.url.clone())?
        .set_default("backend.anon_key", defaults.backend.anon_key.clone())?
        .set_default(
            "backend.request_timeout_seconds",
            i64::try_from(defaults.backend.request_timeout_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("storage.bucket", defaults.storage.bucket.clone())?
        .set_default(
            "storage.signed_url_ttl_seconds",
            i64::try_from(defaults.storage.signed_url_ttl_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("invites.expiry_days", defaults.invites.expiry_days)?
        .set_default("invites.default_quota", i64::from(defaults.invites.default_quota))?;

    let environment_overrides = config::Environment::with_prefix("BAZAAR").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("BAZAAR_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via BAZAAR_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.backend.url.trim().is_empty() {
        if let Ok(url) = std::env::var(BACKEND_URL_FALLBACK_ENV) {
            debug!(source = BACKEND_URL_FALLBACK_ENV, "using backend url from environment");
            config.backend.url = url;
        }
    }
    if config.backend.anon_key.trim().is_empty() {
        if let Ok(key) = std::env::var(BACKEND_KEY_FALLBACK_ENV) {
            debug!(source = BACKEND_KEY_FALLBACK_ENV, "using backend api key from environment");
            config.backend.anon_key = key;
        }
    }

    config.validate()?;

    debug!(url = %config.backend.base_url(), http_port = config.http.port, "loaded configuration");
    Ok(config)
}
