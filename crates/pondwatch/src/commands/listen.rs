//! `pondwatch listen`: stream alerts from the hub until Ctrl-C.

use tokio::sync::watch;
use tracing::{info, warn};

use pondwatch_core::{AlertClient, ConnectionState, Severity};

use crate::cli::{GlobalOpts, ListenArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, JsonEvent};

pub async fn handle(args: &ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let hub = config::resolve_hub(global, &cfg)?;
    let url = hub.client.endpoint.to_string();

    let color = output::should_color(config::color_mode(global, Some(&cfg)));

    let client = AlertClient::websocket(hub.client)?;
    subscribe(&client, args, global, color);

    info!(profile = %hub.profile, authenticated = hub.token.is_some(), "Listening for alerts");
    client.start(hub.token);

    let mut states = client.state_watch();
    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => res.map_err(CliError::from),
        () = gave_up(&mut states), if !args.stay => Err(CliError::GaveUp {
            url,
            attempts: client.reconnect_attempts(),
        }),
    };

    client.stop();
    outcome
}

/// Resolves once the client has exhausted its retries.
async fn gave_up(states: &mut watch::Receiver<ConnectionState>) {
    let _ = states
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await;
}

fn subscribe(client: &AlertClient, args: &ListenArgs, global: &GlobalOpts, color: bool) {
    let quiet = global.quiet;
    let json = args.json;
    let min_severity = Severity::from(args.min_severity);

    client.on_alert(move |alert| {
        if alert.severity < min_severity {
            return;
        }
        let line = if json {
            output::render_json(&JsonEvent::Alert { alert })
        } else {
            Ok(output::format_alert(alert, color))
        };
        emit(line, quiet);
    });

    client.on_alert_resolved(move |resolution| {
        let line = if json {
            output::render_json(&JsonEvent::Resolved { resolution })
        } else {
            Ok(output::format_resolution(resolution, color))
        };
        emit(line, quiet);
    });

    if args.show_state {
        client.on_state_change(move |state| {
            let line = if json {
                output::render_json(&JsonEvent::State {
                    state: state.to_string(),
                })
            } else {
                Ok(output::format_state(*state, color))
            };
            emit(line, quiet);
        });
    }
}

fn emit(line: Result<String, serde_json::Error>, quiet: bool) {
    match line {
        Ok(line) => output::print_line(&line, quiet),
        Err(e) => warn!(error = %e, "Failed to render event"),
    }
}
