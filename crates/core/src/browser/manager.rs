//! Connection lifecycle: discovery, launch, bounded-retry reconnect, health.
//!
//! The manager exclusively owns the remote session's identity. Components
//! holding a session handle must re-acquire it through [`ConnectionManager::session`]
//! after every operation boundary rather than caching it across health
//! checks, since a reconnect replaces the session object.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, RwLock, mpsc};
use tracing::{debug, info, warn};

use super::cdp::{CdpSession, SessionClient};
use super::finder::find_browser_executable;
use super::launcher::launch_browser;
use super::probe::{PortStatus, port_status};
use crate::config::Config;
use crate::error::{ControlError, Result};

/// Connection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
	Disconnected,
	Connecting,
	Connected,
	/// Health checking gave up after repeated failures; reconnection waits
	/// for an explicit external retry.
	Degraded,
}

impl ConnectionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConnectionStatus::Disconnected => "disconnected",
			ConnectionStatus::Connecting => "connecting",
			ConnectionStatus::Connected => "connected",
			ConnectionStatus::Degraded => "degraded",
		}
	}
}

/// Snapshot of the manager's state. Owned by the manager; other components
/// read it but request actions (reconnect) instead of mutating it.
#[derive(Debug, Clone)]
pub struct ConnectionState {
	pub status: ConnectionStatus,
	pub debug_port: u16,
	pub retry_count: u32,
	pub last_error: Option<String>,
}

/// Status event surfaced to the coordinator and upward.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
	pub connected: bool,
	pub message: String,
}

/// Pluggable connect primitives, separated so the manager's retry and
/// health logic can be tested without a browser.
#[async_trait]
pub trait Connector: Send + Sync {
	/// Classifies what is listening on `port`.
	async fn probe(&self, port: u16) -> PortStatus;

	/// Brings a debug-enabled browser up on `port`.
	async fn launch(&self, port: u16) -> Result<()>;

	/// Opens a session client against an endpoint known to be live.
	fn open(&self, port: u16) -> Result<Arc<dyn SessionClient>>;
}

/// Production connector backed by the probe/finder/launcher helpers.
pub struct CdpConnector {
	browser_path: Option<PathBuf>,
	user_data_dir: Option<PathBuf>,
}

impl CdpConnector {
	pub fn new(config: &Config) -> Self {
		Self {
			browser_path: config.browser_path.clone(),
			user_data_dir: config.user_data_dir.clone(),
		}
	}
}

#[async_trait]
impl Connector for CdpConnector {
	async fn probe(&self, port: u16) -> PortStatus {
		port_status(port).await
	}

	async fn launch(&self, port: u16) -> Result<()> {
		let executable = find_browser_executable(self.browser_path.as_deref()).ok_or(ControlError::BrowserNotFound)?;
		launch_browser(&executable, port, self.user_data_dir.as_deref()).await?;
		Ok(())
	}

	fn open(&self, port: u16) -> Result<Arc<dyn SessionClient>> {
		Ok(Arc::new(CdpSession::new(port)?))
	}
}

/// Supervises the remote session: discovery of an existing debug browser,
/// launching one when absent, fallback-port adoption, bounded-retry
/// reconnection, and periodic health checking.
pub struct ConnectionManager {
	connector: Box<dyn Connector>,
	state: Mutex<ConnectionState>,
	session: RwLock<Option<Arc<dyn SessionClient>>>,
	events: mpsc::Sender<ConnectionEvent>,
	connect_gate: AsyncMutex<()>,
	preferred_port: u16,
	fallback_range: u16,
	retries: u32,
	backoff: Duration,
	max_health_failures: u32,
	health_failures: AtomicU32,
	gave_up: AtomicBool,
}

impl ConnectionManager {
	pub fn new(config: &Config, events: mpsc::Sender<ConnectionEvent>) -> Self {
		Self::with_connector(Box::new(CdpConnector::new(config)), config, events)
	}

	/// Builds a manager over an explicit connector; used by tests.
	pub fn with_connector(connector: Box<dyn Connector>, config: &Config, events: mpsc::Sender<ConnectionEvent>) -> Self {
		Self {
			connector,
			state: Mutex::new(ConnectionState {
				status: ConnectionStatus::Disconnected,
				debug_port: config.debug_port,
				retry_count: 0,
				last_error: None,
			}),
			session: RwLock::new(None),
			events,
			connect_gate: AsyncMutex::new(()),
			preferred_port: config.debug_port,
			fallback_range: config.fallback_ports,
			retries: config.connect_retries,
			backoff: config.connect_backoff(),
			max_health_failures: config.max_health_failures,
			health_failures: AtomicU32::new(0),
			gave_up: AtomicBool::new(false),
		}
	}

	/// Current state snapshot.
	pub fn state(&self) -> ConnectionState {
		self.state.lock().expect("connection state lock poisoned").clone()
	}

	/// The live session, or `ConnectionLost` when disconnected. Callers
	/// re-acquire per operation and never cache the returned handle.
	pub async fn session(&self) -> Result<Arc<dyn SessionClient>> {
		self.session
			.read()
			.await
			.clone()
			.ok_or_else(|| ControlError::ConnectionLost("no active browser session".to_string()))
	}

	/// Records a session failure observed by another component (monitor or
	/// dispatcher), feeding the health failure budget.
	pub fn note_session_error(&self) {
		self.health_failures.fetch_add(1, Ordering::Relaxed);
	}

	/// Guarantees a connected session when possible. No-op when already
	/// connected; otherwise probes, launches, resolves port conflicts, and
	/// retries with fixed backoff up to the configured bound.
	pub async fn ensure_connected(&self) -> Result<()> {
		let _gate = self.connect_gate.lock().await;

		if self.state().status == ConnectionStatus::Connected && self.session.read().await.is_some() {
			return Ok(());
		}

		self.update_state(|state| state.status = ConnectionStatus::Connecting);

		let mut last_error = ControlError::ConnectionLost("no connection attempt made".to_string());
		for attempt in 0..=self.retries {
			if attempt > 0 {
				tokio::time::sleep(self.backoff).await;
			}

			match self.connect_once().await {
				Ok((port, session)) => {
					*self.session.write().await = Some(session);
					self.update_state(|state| {
						state.status = ConnectionStatus::Connected;
						state.debug_port = port;
						state.retry_count = 0;
						state.last_error = None;
					});
					self.health_failures.store(0, Ordering::Relaxed);
					self.gave_up.store(false, Ordering::Relaxed);
					info!(target = "restbreak.session", port, "browser connected");
					self.emit(true, format!("browser connected on port {}", port)).await;
					return Ok(());
				}
				Err(err) => {
					warn!(target = "restbreak.session", attempt, error = %err, "connect attempt failed");
					let retryable = err.retryable();
					self.update_state(|state| {
						state.retry_count = attempt + 1;
						state.last_error = Some(err.to_string());
					});
					last_error = err;
					if !retryable {
						break;
					}
				}
			}
		}

		self.update_state(|state| state.status = ConnectionStatus::Disconnected);
		self.emit(false, last_error.to_string()).await;
		Err(last_error)
	}

	async fn connect_once(&self) -> Result<(u16, Arc<dyn SessionClient>)> {
		let mut port = self.preferred_port;
		let mut status = self.connector.probe(port).await;

		if matches!(status, PortStatus::Foreign) {
			port = self.scan_fallback().await?;
			status = self.connector.probe(port).await;
		}

		if matches!(status, PortStatus::Free) {
			self.connector.launch(port).await?;
		}

		let session = self.connector.open(port)?;
		// Handshake round-trip before the session is handed out.
		session.list_targets().await.map_err(|_| ControlError::HandshakeTimeout(port))?;
		Ok((port, session))
	}

	/// First fallback port that is free or already debug-capable.
	async fn scan_fallback(&self) -> Result<u16> {
		let start = self.preferred_port.saturating_add(1);
		let end = self.preferred_port.saturating_add(self.fallback_range.max(1));
		for candidate in start..=end {
			match self.connector.probe(candidate).await {
				PortStatus::Foreign => {
					debug!(target = "restbreak.session", port = candidate, "fallback port occupied");
				}
				PortStatus::Free | PortStatus::DebugEndpoint(_) => {
					debug!(target = "restbreak.session", port = candidate, "adopted fallback port");
					return Ok(candidate);
				}
			}
		}
		Err(ControlError::PortConflict { start, end })
	}

	/// One health round: a trivial no-op evaluation through the session.
	/// On failure the session is dropped and reconnection runs, bounded by
	/// the consecutive-failure cap; past the cap the manager degrades and
	/// waits for [`ConnectionManager::retry`].
	pub async fn health_check(&self) -> bool {
		if self.gave_up.load(Ordering::Relaxed) {
			return false;
		}

		let session = self.session.read().await.clone();
		match session {
			Some(session) => match self.health_probe(session.as_ref()).await {
				Ok(()) => {
					self.health_failures.store(0, Ordering::Relaxed);
					true
				}
				Err(err) => {
					warn!(target = "restbreak.session", error = %err, "health check failed");
					self.drop_session().await;
					self.reconnect_after_failure().await
				}
			},
			None => self.reconnect_after_failure().await,
		}
	}

	async fn health_probe(&self, session: &dyn SessionClient) -> Result<()> {
		let targets = session.list_targets().await?;
		if let Some(page) = targets.iter().find(|t| t.is_page() && t.ws_url.is_some()) {
			session.evaluate(page, "1 + 1").await?;
		}
		Ok(())
	}

	async fn reconnect_after_failure(&self) -> bool {
		let failures = self.health_failures.fetch_add(1, Ordering::Relaxed) + 1;
		if failures > self.max_health_failures {
			self.gave_up.store(true, Ordering::Relaxed);
			self.update_state(|state| state.status = ConnectionStatus::Degraded);
			self.emit(false, "browser unreachable; reconnect paused until retried manually".to_string()).await;
			return false;
		}
		self.ensure_connected().await.is_ok()
	}

	/// Explicit external retry after the manager gave up.
	pub async fn retry(&self) -> Result<()> {
		self.gave_up.store(false, Ordering::Relaxed);
		self.health_failures.store(0, Ordering::Relaxed);
		self.update_state(|state| state.status = ConnectionStatus::Disconnected);
		self.ensure_connected().await
	}

	/// Drops the session and marks the manager disconnected.
	pub async fn shutdown(&self) {
		self.drop_session().await;
	}

	async fn drop_session(&self) {
		*self.session.write().await = None;
		self.update_state(|state| state.status = ConnectionStatus::Disconnected);
	}

	fn update_state(&self, apply: impl FnOnce(&mut ConnectionState)) {
		let mut state = self.state.lock().expect("connection state lock poisoned");
		apply(&mut state);
	}

	async fn emit(&self, connected: bool, message: String) {
		let _ = self.events.send(ConnectionEvent { connected, message }).await;
	}
}

/// Spawns the periodic health loop for `manager`.
pub fn spawn_health_loop(manager: Arc<ConnectionManager>, interval: Duration) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			tokio::time::sleep(interval).await;
			manager.health_check().await;
		}
	})
}
