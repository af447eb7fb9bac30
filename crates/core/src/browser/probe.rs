//! CDP endpoint probing and debug-port selection.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ControlError, Result};

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);

/// `/json/version` response subset from the remote-debugging endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: Option<String>,
}

/// What is listening on a candidate debug port.
#[derive(Debug, Clone)]
pub enum PortStatus {
	/// Nothing accepts connections; the port can be adopted for a launch.
	Free,
	/// A live remote-debugging endpoint answered `/json/version`.
	DebugEndpoint(VersionInfo),
	/// Something accepts TCP but does not speak the debugging protocol.
	Foreign,
}

/// Resolves version metadata from `/json/version` on `port`.
pub async fn fetch_version(port: u16) -> Result<VersionInfo> {
	let client = reqwest::Client::builder()
		.timeout(PROBE_TIMEOUT)
		.build()
		.map_err(|e| ControlError::Context(format!("failed to create http client: {}", e)))?;
	let mut last_error = "no response".to_string();

	for url in [
		format!("http://127.0.0.1:{}/json/version", port),
		format!("http://localhost:{}/json/version", port),
		format!("http://[::1]:{}/json/version", port),
	] {
		let response = match client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				last_error = e.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json::<VersionInfo>()
			.await
			.map_err(|e| ControlError::Context(format!("failed to parse version response: {}", e)));
	}

	Err(ControlError::Context(format!("no debugging endpoint on port {}: {}", port, last_error)))
}

/// Classifies `port` as free, debug-capable, or occupied by a foreign
/// process.
pub async fn port_status(port: u16) -> PortStatus {
	if let Ok(info) = fetch_version(port).await {
		return PortStatus::DebugEndpoint(info);
	}

	let connect = tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(("127.0.0.1", port))).await;
	match connect {
		Ok(Ok(_)) => PortStatus::Foreign,
		_ => PortStatus::Free,
	}
}
