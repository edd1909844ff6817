//! `pondwatch decode`: run captured frames through the codec.

use std::io::{self, Read};

use pondwatch_core::{InboundMessage, decode_frame};

use crate::cli::{DecodeArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, JsonEvent};

pub fn handle(args: &DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let input = match args.file {
        Some(ref path) if path.as_os_str() != "-" => std::fs::read_to_string(path)?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    // A broken config file must not stop offline decoding.
    let cfg = config::load_config().ok();
    let color = output::should_color(config::color_mode(global, cfg.as_ref()));
    let mut total = 0;
    let mut failed = 0;

    for (idx, line) in input.lines().enumerate() {
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }
        total += 1;

        match decode_frame(frame) {
            Ok(message) => {
                let rendered = if args.json {
                    output::render_json(&JsonEvent::from_message(&message))?
                } else {
                    describe(&message, color)
                };
                output::print_line(&rendered, global.quiet);
            }
            Err(e) => {
                failed += 1;
                eprintln!("line {}: {e}", idx + 1);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Decode { failed, total });
    }
    Ok(())
}

fn describe(message: &InboundMessage, color: bool) -> String {
    match message {
        InboundMessage::AlertReceived(alert) => output::format_alert(alert, color),
        InboundMessage::AlertResolved(resolution) => output::format_resolution(resolution, color),
        InboundMessage::Unrecognized(frame) => format!("(unrecognized) {frame}"),
    }
}
