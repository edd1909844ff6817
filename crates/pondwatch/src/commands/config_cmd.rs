//! Config subcommand handlers.

use std::fmt::Write;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            output::print_line(&config::config_path().display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            output::print_line(&format_config_redacted(&cfg), global.quiet);
        }
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            output::print_line(&format_profiles(&cfg), global.quiet);
        }
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            set_default_profile(&mut cfg, name)?;
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
        }
    }
    Ok(())
}

fn set_default_profile(cfg: &mut Config, name: &str) -> Result<(), CliError> {
    if !cfg.profiles.contains_key(name) {
        return Err(CliError::ProfileNotFound {
            name: name.to_owned(),
            available: config::available_profiles(cfg),
        });
    }
    cfg.default_profile = Some(name.to_owned());
    Ok(())
}

/// Format config for display, masking tokens.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "connect_timeout = {}", cfg.defaults.connect_timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "endpoint = \"{}\"", p.endpoint);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(timeout) = p.connect_timeout {
            let _ = writeln!(out, "connect_timeout = {timeout}");
        }
        if let Some(ref backoff) = p.backoff {
            if let Some(ms) = backoff.base_delay_ms {
                let _ = writeln!(out, "backoff.base_delay_ms = {ms}");
            }
            if let Some(ms) = backoff.max_delay_ms {
                let _ = writeln!(out, "backoff.max_delay_ms = {ms}");
            }
            if let Some(n) = backoff.max_attempts {
                let _ = writeln!(out, "backoff.max_attempts = {n}");
            }
        }
    }

    out.trim_end().to_owned()
}

fn format_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "No profiles configured".into();
    }
    let default = cfg.default_profile.as_deref();
    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let marker = if Some(name.as_str()) == default { "*" } else { " " };
            format!("{marker} {name}\t{}", cfg.profiles[name].endpoint)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
