//! Clap derive structures for the `pondwatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pondwatch_core::Severity;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pondwatch -- live water-quality alerts from the farm's alert hub
#[derive(Debug, Parser)]
#[command(
    name = "pondwatch",
    version,
    about = "Listen to pond water-quality alerts from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "POND_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Alert hub WebSocket URL (overrides profile)
    #[arg(long, short = 'e', env = "POND_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Access token (overrides keyring and profile)
    #[arg(long, env = "POND_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Connection handshake timeout in seconds
    #[arg(long, env = "POND_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// When to use color output [default: `defaults.color` from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Severity threshold accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Self::Low,
            SeverityArg::Medium => Self::Medium,
            SeverityArg::High => Self::High,
            SeverityArg::Urgent => Self::Urgent,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the alert hub and print alerts until interrupted
    #[command(alias = "l")]
    Listen(ListenArgs),

    /// Decode captured hub frames (one JSON frame per line)
    Decode(DecodeArgs),

    /// Inspect CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Listen ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Only print alerts at or above this severity
    #[arg(long, short = 's', default_value = "low")]
    pub min_severity: SeverityArg,

    /// Emit one JSON object per line instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Also print connection state changes
    #[arg(long)]
    pub show_state: bool,

    /// Keep running after the client gives up; wait for Ctrl-C
    #[arg(long)]
    pub stay: bool,
}

// ── Decode ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// File of frames to decode (reads stdin when omitted or "-")
    pub file: Option<PathBuf>,

    /// Emit decoded messages as JSON
    #[arg(long)]
    pub json: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the current configuration (tokens masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
