//! Shared configuration for the uhome CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! a persisted OAuth token cache, and translation to the runtime
//! configs of `uhome-api` and `uhome-core`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use uhome_api::{OAuthConfig, TokenSet};
use uhome_core::CoordinatorConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no client secret configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("no cached tokens for profile '{profile}' -- run `uhome auth login` first")]
    NoTokens { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll period in minutes. Minimum 1.
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval_minutes: default_poll_interval_minutes(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval_minutes() -> u64 {
    5
}

/// A named U-home account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// OAuth2 application client id.
    pub client_id: String,

    /// Client secret (plaintext -- prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    /// Redirect URI registered with the OAuth application.
    pub redirect_uri: Option<String>,

    /// Override the action endpoint (self-hosted relays, testing).
    pub api_url: Option<String>,

    /// Override the poll period in minutes.
    pub poll_interval_minutes: Option<u64>,

    /// Override the request timeout in seconds.
    pub timeout: Option<u64>,
}

// ── Config file paths ───────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Path of the persisted token cache.
pub fn token_cache_path() -> PathBuf {
    config_dir().join("tokens.toml")
}

fn config_dir() -> PathBuf {
    ProjectDirs::from("rs", "uhome-rs", "uhome")
        .map_or_else(dirs_fallback, |dirs| dirs.config_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uhome");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("UHOME_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's client secret from the credential chain.
pub fn resolve_client_secret(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's client_secret_env → env var lookup
    if let Some(ref env_name) = profile.client_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new("uhome", &format!("{profile_name}/client-secret")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref secret) = profile.client_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a client secret in the system keyring.
pub fn store_client_secret(profile_name: &str, secret: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new("uhome", &format!("{profile_name}/client-secret"))
        .and_then(|entry| entry.set_password(secret.expose_secret()))
        .map_err(|e| ConfigError::Validation {
            field: "client_secret".into(),
            reason: format!("keyring rejected the secret: {e}"),
        })
}

// ── OAuth token cache ───────────────────────────────────────────────

/// On-disk token cache: one entry per profile.
///
/// Kept outside the main config file so `config.toml` stays shareable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct TokenCache {
    #[serde(default)]
    profiles: HashMap<String, CachedTokens>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct CachedTokens {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

/// Load the cached token set for a profile.
pub fn load_tokens(profile_name: &str) -> Result<TokenSet, ConfigError> {
    load_tokens_from(&token_cache_path(), profile_name)
}

/// Persist a token set for a profile.
pub fn save_tokens(profile_name: &str, tokens: &TokenSet) -> Result<(), ConfigError> {
    save_tokens_to(&token_cache_path(), profile_name, tokens)
}

fn load_tokens_from(path: &Path, profile_name: &str) -> Result<TokenSet, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::NoTokens {
        profile: profile_name.into(),
    })?;
    let cache: TokenCache = toml::from_str(&raw).map_err(|e| ConfigError::Validation {
        field: "token cache".into(),
        reason: e.to_string(),
    })?;

    let entry = cache
        .profiles
        .get(profile_name)
        .ok_or_else(|| ConfigError::NoTokens {
            profile: profile_name.into(),
        })?;

    Ok(TokenSet {
        access_token: SecretString::from(entry.access_token.clone()),
        refresh_token: SecretString::from(entry.refresh_token.clone()),
        expires_at: entry.expires_at,
    })
}

fn save_tokens_to(path: &Path, profile_name: &str, tokens: &TokenSet) -> Result<(), ConfigError> {
    let mut cache: TokenCache = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| toml::from_str(&raw).ok())
        .unwrap_or_default();

    cache.profiles.insert(
        profile_name.to_owned(),
        CachedTokens {
            access_token: tokens.access_token.expose_secret().to_owned(),
            refresh_token: tokens.refresh_token.expose_secret().to_owned(),
            expires_at: tokens.expires_at,
        },
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&cache)?)?;

    // Token material: keep the cache private where the platform allows.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

// ── Translation to runtime configs ──────────────────────────────────

/// Build the `OAuthConfig` for a profile.
pub fn resolve_oauth_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<OAuthConfig, ConfigError> {
    if profile.client_id.is_empty() {
        return Err(ConfigError::Validation {
            field: "client_id".into(),
            reason: format!("profile '{profile_name}' has no client_id"),
        });
    }

    let secret = resolve_client_secret(profile, profile_name)?;
    OAuthConfig::new(profile.client_id.clone(), secret).map_err(|e| ConfigError::Validation {
        field: "oauth endpoints".into(),
        reason: e.to_string(),
    })
}

/// Build a `CoordinatorConfig` from a profile plus global defaults.
///
/// The poll period is given in minutes with a floor of 1; values below
/// are clamped with a warning.
pub fn coordinator_config(profile: &Profile, defaults: &Defaults) -> CoordinatorConfig {
    let mut minutes = profile
        .poll_interval_minutes
        .unwrap_or(defaults.poll_interval_minutes);

    if minutes < 1 {
        warn!(requested = minutes, "poll interval below one minute, clamping");
        minutes = 1;
    }

    CoordinatorConfig::with_poll_interval(Duration::from_secs(minutes * 60))
}

/// Request timeout for a profile.
pub fn request_timeout(profile: &Profile, defaults: &Defaults) -> Duration {
    Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout))
}
