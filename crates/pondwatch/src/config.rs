//! CLI configuration: thin wrapper around `pondwatch_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--endpoint, --token, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use pondwatch_config::ConfigError;
use pondwatch_core::ClientConfig;

use clap::ValueEnum;

use crate::cli::{ColorMode, GlobalOpts};
use crate::error::CliError;

pub use pondwatch_config::{Config, config_path, load_config, save_config};

/// Everything `listen` needs to connect.
#[derive(Debug)]
pub struct ResolvedHub {
    pub profile: String,
    pub client: ClientConfig,
    pub token: Option<SecretString>,
}

/// Translate the active profile + global flags into a client config.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_hub(global: &GlobalOpts, config: &Config) -> Result<ResolvedHub, CliError> {
    let (name, mut profile) = config
        .resolve_profile(global.profile.as_deref())
        .map_err(|err| match err {
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: available_profiles(config),
            },
            other => other.into(),
        })?;

    // 1. Endpoint (flag > env > profile)
    if let Some(ref endpoint) = global.endpoint {
        profile.endpoint.clone_from(endpoint);
    }
    let mut client = pondwatch_config::profile_to_client_config(&profile, &config.defaults)?;

    // 2. Timeout
    if let Some(secs) = global.timeout {
        client.connect_timeout = Duration::from_secs(secs);
    }

    // 3. Token (flag > env var > keyring > plaintext)
    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .or_else(|| pondwatch_config::resolve_token(&profile, &name));

    Ok(ResolvedHub {
        profile: name,
        client,
        token,
    })
}

/// Color mode: `--color` flag, then `defaults.color`, then auto.
///
/// An unrecognized config value falls back to auto with a warning.
pub fn color_mode(global: &GlobalOpts, config: Option<&Config>) -> ColorMode {
    if let Some(mode) = global.color {
        return mode;
    }
    let Some(raw) = config.map(|cfg| cfg.defaults.color.as_str()) else {
        return ColorMode::Auto;
    };
    ColorMode::from_str(raw, true).unwrap_or_else(|_| {
        tracing::warn!(value = raw, "Unknown defaults.color, using auto");
        ColorMode::Auto
    })
}

/// Comma-separated, sorted profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(color: Option<ColorMode>) -> GlobalOpts {
        GlobalOpts {
            profile: None,
            endpoint: None,
            token: None,
            timeout: None,
            color,
            verbose: 0,
            quiet: false,
        }
    }

    #[test]
    fn color_flag_wins_over_config_default() {
        let mut cfg = Config::default();
        cfg.defaults.color = "never".into();

        assert!(matches!(color_mode(&global(None), Some(&cfg)), ColorMode::Never));
        assert!(matches!(
            color_mode(&global(Some(ColorMode::Always)), Some(&cfg)),
            ColorMode::Always
        ));
        assert!(matches!(color_mode(&global(None), None), ColorMode::Auto));

        cfg.defaults.color = "sometimes".into();
        assert!(matches!(color_mode(&global(None), Some(&cfg)), ColorMode::Auto));
    }
}
