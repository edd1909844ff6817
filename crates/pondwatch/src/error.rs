//! CLI error types with miette diagnostics.
//!
//! Maps config and client failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pondwatch_config::ConfigError;
use pondwatch_core::ClientError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const DATA: i32 = 65;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Gave up connecting to the alert hub at {url}")]
    #[diagnostic(
        code(pondwatch::connection_failed),
        help(
            "The hub could not be reached after {attempts} attempts.\n\
             Check the endpoint, your network, and that the token is still valid.\n\
             Use --stay to keep waiting for a manual retry."
        )
    )]
    GaveUp { url: String, attempts: u32 },

    #[error(transparent)]
    #[diagnostic(code(pondwatch::client))]
    Client(#[from] ClientError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pondwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pondwatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Run: pondwatch config profiles"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(pondwatch::config))]
    Config(ConfigError),

    // ── Decode ───────────────────────────────────────────────────────
    #[error("{failed} of {total} frames could not be decoded")]
    #[diagnostic(
        code(pondwatch::decode),
        help("Each line must hold one JSON frame as sent by the alert hub.")
    )]
    Decode { failed: usize, total: usize },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(pondwatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::GaveUp { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Decode { .. } => exit_code::DATA,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            other => Self::Config(other),
        }
    }
}
