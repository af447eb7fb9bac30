//! Chrome DevTools Protocol session client.
//!
//! Target listing goes over the endpoint's HTTP surface (`/json/list`);
//! script evaluation opens a short-lived WebSocket to the target's debugger
//! URL and issues a single `Runtime.evaluate`. One logical sequence is in
//! flight per tab socket; independent tabs may be evaluated in parallel.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::{ControlError, Result};

/// Upper bound for one evaluation round-trip, socket setup included.
pub const EVALUATE_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_millis(1_500);

/// Debuggable target kind as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
	Page,
	Other,
}

/// One debuggable tab/page. A snapshot; never cached across polls.
#[derive(Debug, Clone)]
pub struct Target {
	pub id: String,
	pub url: String,
	pub kind: TargetKind,
	pub ws_url: Option<String>,
}

impl Target {
	pub fn is_page(&self) -> bool {
		self.kind == TargetKind::Page
	}
}

/// `/json/list` entry subset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetEntry {
	id: String,
	url: String,
	#[serde(rename = "type")]
	kind: String,
	web_socket_debugger_url: Option<String>,
}

impl From<TargetEntry> for Target {
	fn from(entry: TargetEntry) -> Self {
		let kind = if entry.kind == "page" { TargetKind::Page } else { TargetKind::Other };
		Target {
			id: entry.id,
			url: entry.url,
			kind,
			ws_url: entry.web_socket_debugger_url,
		}
	}
}

/// Capability interface to one live remote-debugging session.
///
/// The connection manager owns the concrete session's identity; the playback
/// monitor and command dispatcher program against this trait so they can be
/// tested with a fake.
#[async_trait]
pub trait SessionClient: Send + Sync {
	/// Enumerates debuggable targets. Fresh snapshot on every call.
	async fn list_targets(&self) -> Result<Vec<Target>>;

	/// Evaluates `expression` in the target's context, result by value.
	async fn evaluate(&self, target: &Target, expression: &str) -> Result<Value>;
}

/// Concrete CDP-backed session bound to one debugging port.
pub struct CdpSession {
	port: u16,
	http: reqwest::Client,
}

impl CdpSession {
	pub fn new(port: u16) -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(HTTP_TIMEOUT)
			.build()
			.map_err(|e| ControlError::Context(format!("failed to create http client: {}", e)))?;
		Ok(Self { port, http })
	}

	pub fn port(&self) -> u16 {
		self.port
	}
}

#[async_trait]
impl SessionClient for CdpSession {
	async fn list_targets(&self) -> Result<Vec<Target>> {
		let url = format!("http://127.0.0.1:{}/json/list", self.port);
		let entries: Vec<TargetEntry> = self.http.get(&url).send().await?.error_for_status()?.json().await?;
		Ok(entries.into_iter().map(Target::from).collect())
	}

	async fn evaluate(&self, target: &Target, expression: &str) -> Result<Value> {
		let ws_url = target.ws_url.as_deref().ok_or_else(|| ControlError::EvaluationFailed {
			target_id: target.id.clone(),
			message: "target exposes no debugger url".to_string(),
		})?;

		tokio::time::timeout(EVALUATE_TIMEOUT, evaluate_over_ws(ws_url, &target.id, expression))
			.await
			.map_err(|_| ControlError::EvaluationFailed {
				target_id: target.id.clone(),
				message: "evaluation timed out".to_string(),
			})?
	}
}

async fn evaluate_over_ws(ws_url: &str, target_id: &str, expression: &str) -> Result<Value> {
	debug!(target = "restbreak.session", %target_id, "opening evaluation socket");
	let (mut ws, _) = connect_async(ws_url).await?;

	// Short-lived socket, single command; a fixed id is unambiguous.
	let id = 1u64;
	let command = json!({
		"id": id,
		"method": "Runtime.evaluate",
		"params": { "expression": expression, "returnByValue": true },
	});
	ws.send(Message::Text(command.to_string())).await?;

	while let Some(frame) = ws.next().await {
		match frame? {
			Message::Text(text) => {
				let Ok(response) = serde_json::from_str::<Value>(&text) else { continue };
				if response.get("id").and_then(Value::as_u64) != Some(id) {
					// Event traffic or an unrelated response; skip.
					continue;
				}
				let value = extract_value(target_id, &response)?;
				let _ = ws.close(None).await;
				return Ok(value);
			}
			Message::Close(_) => break,
			_ => continue,
		}
	}

	Err(ControlError::ConnectionLost(format!("devtools socket closed during evaluate for {}", target_id)))
}

fn extract_value(target_id: &str, response: &Value) -> Result<Value> {
	if let Some(error) = response.get("error") {
		let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown protocol error");
		return Err(ControlError::EvaluationFailed {
			target_id: target_id.to_string(),
			message: message.to_string(),
		});
	}

	let result = response.get("result").cloned().unwrap_or_else(|| json!({}));
	if let Some(exception) = result.get("exceptionDetails") {
		let message = exception.get("text").and_then(Value::as_str).unwrap_or("script threw");
		return Err(ControlError::EvaluationFailed {
			target_id: target_id.to_string(),
			message: message.to_string(),
		});
	}

	Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
}
