//! Output formatting for alerts, resolutions and connection states.
//!
//! Text mode is one line per event; interruptive severities stand out
//! when color is enabled. JSON mode emits one compact object per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use pondwatch_core::{AlertEvent, AlertResolution, ConnectionState, InboundMessage, Severity};

use crate::cli::ColorMode;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_severity(severity: Severity, color: bool) -> String {
    let label = severity.to_string().to_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::Urgent => label.on_red().bold().to_string(),
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.dimmed().to_string(),
    }
}

// ── Text renderers ───────────────────────────────────────────────────

pub fn format_alert(alert: &AlertEvent, color: bool) -> String {
    let pond = alert
        .pond_name
        .clone()
        .unwrap_or_else(|| format!("pond {}", alert.pond_id));
    let parameter = alert.parameter_name;
    let unit = parameter.unit();
    let value = if unit.is_empty() {
        format!("{:.2}", alert.measured_value)
    } else {
        format!("{:.2} {unit}", alert.measured_value)
    };

    format!(
        "{} {:<7} #{} {pond}: {} {value} ({}) {}",
        alert.created_at.format("%Y-%m-%d %H:%M:%S"),
        paint_severity(alert.severity, color),
        alert.id,
        parameter.label(),
        alert.kind,
        alert.message,
    )
}

pub fn format_resolution(resolution: &AlertResolution, color: bool) -> String {
    let by = resolution
        .resolved_by_user_name
        .as_deref()
        .map(|name| format!(" by {name}"))
        .unwrap_or_default();
    let tag = if color {
        "RESOLVED".green().to_string()
    } else {
        "RESOLVED".to_owned()
    };
    format!("{tag} #{}{by}", resolution.alert_id)
}

pub fn format_state(state: ConnectionState, color: bool) -> String {
    let line = format!("-- {state}");
    if color { line.cyan().to_string() } else { line }
}

// ── JSON renderers ───────────────────────────────────────────────────

/// Tagged JSON envelope for `--json` output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JsonEvent<'a> {
    Alert { alert: &'a AlertEvent },
    Resolved { resolution: &'a AlertResolution },
    State { state: String },
    Unrecognized { frame: &'a serde_json::Value },
}

impl<'a> JsonEvent<'a> {
    pub fn from_message(message: &'a InboundMessage) -> Self {
        match message {
            InboundMessage::AlertReceived(alert) => Self::Alert { alert },
            InboundMessage::AlertResolved(resolution) => Self::Resolved { resolution },
            InboundMessage::Unrecognized(frame) => Self::Unrecognized { frame },
        }
    }
}

pub fn render_json(event: &JsonEvent<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Print a line to stdout, respecting quiet mode.
pub fn print_line(line: &str, quiet: bool) {
    if quiet || line.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
}
