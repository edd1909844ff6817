//! Shared configuration for pondwatch tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `pondwatch_core::ClientConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pondwatch_core::{BackoffPolicy, ClientConfig, DEFAULT_ENDPOINT};

/// Keyring service name; entries are keyed `<profile>/token`.
pub const KEYRING_SERVICE: &str = "pondwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

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
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
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

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_color")]
    pub color: String,

    /// Handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            color: default_color(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_color() -> String {
    "auto".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

/// A named alert hub profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Hub WebSocket URL (e.g., "wss://farm.example.com/hubs/alerts").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Access token (plaintext -- prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Override the handshake timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffOverrides>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            token_env: None,
            connect_timeout: None,
            backoff: None,
        }
    }
}

/// Partial backoff settings; anything unset keeps the client default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackoffOverrides {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl BackoffOverrides {
    /// Apply on top of `base`, rejecting nonsensical combinations.
    pub fn apply(&self, base: BackoffPolicy) -> Result<BackoffPolicy, ConfigError> {
        let policy = BackoffPolicy {
            base_delay: self
                .base_delay_ms
                .map_or(base.base_delay, Duration::from_millis),
            max_delay: self
                .max_delay_ms
                .map_or(base.max_delay, Duration::from_millis),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
        };

        if policy.base_delay.is_zero() {
            return Err(ConfigError::Validation {
                field: "backoff.base_delay_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if policy.max_delay < policy.base_delay {
            return Err(ConfigError::Validation {
                field: "backoff.max_delay_ms".into(),
                reason: "must not be smaller than base_delay_ms".into(),
            });
        }
        Ok(policy)
    }
}

impl Config {
    /// Pick the active profile: `requested`, else `default_profile`, else
    /// "default". An unnamed profile missing from the file falls back to
    /// built-in settings; an explicitly requested one must exist.
    pub fn resolve_profile(&self, requested: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");

        match self.profiles.get(name) {
            Some(profile) => Ok((name.to_owned(), profile.clone())),
            None if requested.is_none() => Ok((name.to_owned(), Profile::default())),
            None => Err(ConfigError::UnknownProfile {
                profile: name.to_owned(),
            }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "pondwatch", "pondwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pondwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` merged with `POND_` environment overrides
/// (`POND_DEFAULT_PROFILE`, `POND_DEFAULTS__COLOR`, ...). A missing
/// file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POND_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the access token from the credential chain (no CLI flag step).
///
/// `None` means connect unauthenticated; the hub decides whether that is
/// acceptable.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_token_with(
        profile,
        |name| std::env::var(name).ok(),
        || keyring_token(profile_name),
    )
}

fn keyring_token(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.get_password())
        .ok()
}

fn resolve_token_with(
    profile: &Profile,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(val) = profile.token_env.as_deref().and_then(env) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring() {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Parse and check a hub endpoint.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "endpoint".into(),
        reason: format!("invalid URL: {raw}"),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{other}://'"),
        }),
    }
}

/// Build a `ClientConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::new(parse_endpoint(&profile.endpoint)?);

    config.connect_timeout =
        Duration::from_secs(profile.connect_timeout.unwrap_or(defaults.connect_timeout));
    if let Some(ref overrides) = profile.backoff {
        config.backoff = overrides.apply(config.backoff)?;
    }

    Ok(config)
}
