//! Error taxonomy for browser control and timer orchestration.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Failures surfaced by the browser-control subsystem.
///
/// Browser-facing errors are converted to status events at the connection
/// manager / dispatcher boundary; the timer never observes them.
#[derive(Debug, Error)]
pub enum ControlError {
	/// No usable browser executable on this machine. Not retried
	/// automatically; requires user intervention.
	#[error("no browser executable found; install Edge/Chrome or set browserPath in the config")]
	BrowserNotFound,

	/// The browser process failed to spawn or exited before the
	/// debugging endpoint came up.
	#[error("browser launch failed: {0}")]
	LaunchFailed(String),

	/// Configured port and the whole fallback range are occupied by
	/// non-debugging processes.
	#[error("no free debugging port in {start}..={end}")]
	PortConflict { start: u16, end: u16 },

	/// The debugging endpoint never answered within the startup grace
	/// period.
	#[error("debugging endpoint on port {0} did not respond in time")]
	HandshakeTimeout(u16),

	/// An established session stopped responding.
	#[error("browser connection lost: {0}")]
	ConnectionLost(String),

	/// A per-tab script evaluation failed. Logged and skipped; never
	/// aborts a whole poll or command batch.
	#[error("evaluation failed in target {target_id}: {message}")]
	EvaluationFailed { target_id: String, message: String },

	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("websocket transport failed: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("{0}")]
	Context(String),
}

impl ControlError {
	/// Whether the connection manager should retry after this failure.
	pub fn retryable(&self) -> bool {
		match self {
			ControlError::BrowserNotFound | ControlError::PortConflict { .. } => false,
			ControlError::LaunchFailed(_)
			| ControlError::HandshakeTimeout(_)
			| ControlError::ConnectionLost(_)
			| ControlError::Http(_)
			| ControlError::WebSocket(_)
			| ControlError::Io(_) => true,
			ControlError::EvaluationFailed { .. } | ControlError::Context(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::ControlError;

	#[test]
	fn browser_not_found_is_not_retryable() {
		assert!(!ControlError::BrowserNotFound.retryable());
		assert!(!ControlError::PortConflict { start: 9223, end: 9232 }.retryable());
	}

	#[test]
	fn transient_connection_failures_are_retryable() {
		assert!(ControlError::HandshakeTimeout(9222).retryable());
		assert!(ControlError::ConnectionLost("socket closed".into()).retryable());
		assert!(ControlError::LaunchFailed("spawn error".into()).retryable());
	}
}
