//! Browser process launch with a remote-debugging endpoint.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::info;

use super::probe::{VersionInfo, fetch_version};
use crate::error::{ControlError, Result};

const STARTUP_GRACE: Duration = Duration::from_millis(250);
const STARTUP_ATTEMPTS: u32 = 12;

/// Launches `executable` with remote debugging on `port` and waits for the
/// endpoint to come up.
///
/// The launch is non-destructive: existing browser instances are never
/// killed, and a new window is requested so a running profile keeps its
/// tabs.
pub async fn launch_browser(executable: &str, port: u16, user_data_dir: Option<&Path>) -> Result<VersionInfo> {
	let mut args = vec![
		format!("--remote-debugging-port={}", port),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--new-window".to_string(),
	];
	if let Some(dir) = user_data_dir {
		args.push(format!("--user-data-dir={}", dir.display()));
	}

	let mut command = Command::new(executable);
	command.args(&args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut command, 0);

	let mut child = command
		.spawn()
		.map_err(|e| ControlError::LaunchFailed(format!("failed to spawn {}: {}", executable, e)))?;

	info!(target = "restbreak.session", %executable, port, "browser launched, waiting for endpoint");

	for _ in 0..STARTUP_ATTEMPTS {
		tokio::time::sleep(STARTUP_GRACE).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(ControlError::LaunchFailed(format!(
				"browser exited before the debugging endpoint came up (status {})",
				status
			)));
		}

		if let Ok(info) = fetch_version(port).await {
			return Ok(info);
		}
	}

	Err(ControlError::HandshakeTimeout(port))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spawn_failure_maps_to_launch_failed() {
		let err = launch_browser("/nonexistent/browser-binary", 9_499, None).await.unwrap_err();
		assert!(matches!(err, ControlError::LaunchFailed(_)));
	}

	#[tokio::test]
	async fn child_without_endpoint_times_out_or_reports_exit() {
		// `true` exits immediately and never opens a debugging port.
		if which::which("true").is_err() {
			return;
		}
		let err = launch_browser("true", 9_498, None).await.unwrap_err();
		assert!(matches!(err, ControlError::LaunchFailed(_) | ControlError::HandshakeTimeout(_)));
	}
}
