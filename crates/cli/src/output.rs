//! Terminal rendering for surfaced events.

use std::time::Duration;

use restbreak_core::{AppEvent, Phase};

/// Renders a countdown as `mm:ss` (hours fold into minutes).
pub fn format_remaining(remaining: Duration) -> String {
	let total = remaining.as_secs();
	format!("{:02}:{:02}", total / 60, total % 60)
}

/// One line per event, written to stdout. Status lines for the ticking
/// countdown overwrite in place; phase transitions get their own line.
pub fn print_event(event: &AppEvent) {
	match event {
		AppEvent::Timer { phase, remaining, .. } => match phase {
			Phase::Working => print_status(&format!("working  {}", format_remaining(*remaining))),
			Phase::Resting => print_status(&format!("resting  {}", format_remaining(*remaining))),
			Phase::Paused => print_status("paused"),
			Phase::Idle => print_status("idle"),
		},
		AppEvent::RestStarted => print_line("rest started; pausing playback"),
		AppEvent::RestEnded => print_line("rest over; resuming playback"),
		AppEvent::Connection { connected, message } => {
			if *connected {
				print_line(&format!("browser connected: {message}"));
			} else {
				print_line(&format!("browser unavailable: {message}"));
			}
		}
	}
}

fn print_status(text: &str) {
	use std::io::Write;
	// Carriage return keeps the countdown on a single line.
	print!("\r\x1b[2K{text}");
	let _ = std::io::stdout().flush();
}

fn print_line(text: &str) {
	println!("\r\x1b[2K{text}");
}
