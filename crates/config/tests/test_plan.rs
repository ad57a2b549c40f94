//! Test plan for the `bazaar-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and the required backend settings.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use bazaar_config::{load, AppConfig, HttpConfig, InviteConfig, StorageConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "BAZAAR_CONFIG",
    "BAZAAR__BACKEND__URL",
    "BAZAAR__BACKEND__ANON_KEY",
    "BAZAAR__BACKEND__SERVICE_ROLE_KEY",
    "BAZAAR__BACKEND__REQUEST_TIMEOUT_SECONDS",
    "BAZAAR__HTTP__ADDRESS",
    "BAZAAR__HTTP__PORT",
    "BAZAAR__STORAGE__BUCKET",
    "BAZAAR__STORAGE__SIGNED_URL_TTL_SECONDS",
    "BAZAAR__INVITES__EXPIRY_DAYS",
    "BAZAAR__INVITES__DEFAULT_QUOTA",
    "BAZAAR__INVITES__MAIL_ENDPOINT",
    "SUPABASE_URL",
    "SUPABASE_ANON_KEY",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn with_backend(&mut self) {
        self.set_var("BAZAAR__BACKEND__URL", "https://project.example.co");
        self.set_var("BAZAAR__BACKEND__ANON_KEY", "anon-key");
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.with_backend();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.storage.bucket, "items-images");
    assert_eq!(config.storage.signed_url_ttl_seconds, 3_600);
    assert_eq!(config.storage.max_images, 3);
    assert_eq!(config.invites.expiry_days, 7);
    assert_eq!(config.invites.default_quota, 3);
    assert!(config.invites.mail_endpoint.is_none());
}

#[test]
#[serial]
fn load_fails_without_backend_url() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    ctx.set_var("BAZAAR__BACKEND__ANON_KEY", "anon-key");

    let error = load().expect_err("missing url must be fatal");
    assert!(error.to_string().contains("missing backend url"));
}

#[test]
#[serial]
fn load_fails_without_backend_key() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    ctx.set_var("BAZAAR__BACKEND__URL", "https://project.example.co");

    let error = load().expect_err("missing key must be fatal");
    assert!(error.to_string().contains("missing backend api key"));
}

#[test]
#[serial]
fn load_falls_back_to_supabase_environment_names() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    ctx.set_var("SUPABASE_URL", "https://fallback.example.co/");
    ctx.set_var("SUPABASE_ANON_KEY", "fallback-key");

    let config = load().expect("fallback variables should satisfy the backend section");
    assert_eq!(config.backend.base_url(), "https://fallback.example.co");
    assert_eq!(config.backend.anon_key, "fallback-key");
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.with_backend();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "bazaar.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/bazaar.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "bazaar.toml",
        r#"
        [backend]
        url = "https://from-file.example.co"
        anon_key = "file-key"

        [storage]
        bucket = "listing-photos"
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.backend.url, "https://from-file.example.co");
    assert_eq!(config.storage.bucket, "listing-photos");
    assert_eq!(config.storage.max_images, defaults.storage.max_images);
    assert_eq!(config.http.address, defaults.http.address);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.with_backend();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "bazaar.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("BAZAAR__HTTP__PORT", "8080");
    ctx.set_var("BAZAAR__INVITES__MAIL_ENDPOINT", "http://localhost:7070/api/send-invite");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(
        config.invites.mail_endpoint.as_deref(),
        Some("http://localhost:7070/api/send-invite")
    );
}

#[test]
#[serial]
fn load_reads_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.with_backend();

    write_config_file(
        temp_dir.path(),
        "custom/settings.toml",
        r#"
        [invites]
        expiry_days = 14
        "#,
    );
    ctx.set_var(
        "BAZAAR_CONFIG",
        temp_dir.path().join("custom/settings.toml").display().to_string(),
    );

    let config = load().expect("explicit config path should load");
    assert_eq!(config.invites.expiry_days, 14);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.with_backend();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "bazaar.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn validate_rejects_zero_image_limit() {
    let mut config = AppConfig::default();
    config.backend.url = "https://project.example.co".into();
    config.backend.anon_key = "anon".into();
    assert!(config.validate().is_ok());

    config.storage.max_images = 0;
    assert!(config.validate().is_err());
}

#[test]
fn storage_config_defaults_match_listing_limits() {
    let defaults = StorageConfig::default();
    assert_eq!(defaults.max_images, 3);
    assert_eq!(defaults.max_image_bytes, 5 * 1024 * 1024);
}

#[test]
fn invite_config_defaults_issue_six_character_codes() {
    let defaults = InviteConfig::default();
    assert_eq!(defaults.code_length, 6);
    assert_eq!(defaults.expiry_days, 7);
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
}
