//! Cross-component behavior against a fake browser session.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

use restbreak_core::browser::cdp::{SessionClient, Target, TargetKind};
use restbreak_core::browser::dispatcher::CommandDispatcher;
use restbreak_core::browser::manager::{ConnectionManager, Connector};
use restbreak_core::browser::monitor::PlaybackMonitor;
use restbreak_core::browser::probe::{PortStatus, VersionInfo};
use restbreak_core::error::Result;
use restbreak_core::{AppEvent, Config, Coordinator, EventStreams, Phase, spawn_timer};

/// In-memory browser with one bilibili tab whose playback state reacts to
/// the dispatched scripts.
struct FakeBrowser {
	playing: Mutex<bool>,
	pause_evals: AtomicUsize,
	resume_evals: AtomicUsize,
	targets: Vec<Target>,
}

impl FakeBrowser {
	fn new(playing: bool, url: &str) -> Arc<Self> {
		Arc::new(Self {
			playing: Mutex::new(playing),
			pause_evals: AtomicUsize::new(0),
			resume_evals: AtomicUsize::new(0),
			targets: vec![Target {
				id: "tab-1".to_string(),
				url: url.to_string(),
				kind: TargetKind::Page,
				ws_url: Some("ws://fake/devtools/page/tab-1".to_string()),
			}],
		})
	}

	fn toggle(&self, want_playing: bool) -> Value {
		let mut playing = self.playing.lock().unwrap();
		if *playing == want_playing {
			json!({ "found": 1, "toggled": 0, "already": 1 })
		} else {
			*playing = want_playing;
			json!({ "found": 1, "toggled": 1, "already": 0 })
		}
	}
}

#[async_trait]
impl SessionClient for FakeBrowser {
	async fn list_targets(&self) -> Result<Vec<Target>> {
		Ok(self.targets.clone())
	}

	async fn evaluate(&self, _target: &Target, expression: &str) -> Result<Value> {
		if expression.contains("wantPaused = true") {
			self.pause_evals.fetch_add(1, Ordering::Relaxed);
			Ok(self.toggle(false))
		} else if expression.contains("wantPaused = false") {
			self.resume_evals.fetch_add(1, Ordering::Relaxed);
			Ok(self.toggle(true))
		} else if expression.contains("readyState > 2") {
			let playing = *self.playing.lock().unwrap();
			Ok(json!({ "total": 1, "playing": if playing { 1 } else { 0 } }))
		} else {
			// Health no-op.
			Ok(json!(2))
		}
	}
}

struct FakeConnector {
	browser: Arc<FakeBrowser>,
}

#[async_trait]
impl Connector for FakeConnector {
	async fn probe(&self, _port: u16) -> PortStatus {
		PortStatus::DebugEndpoint(VersionInfo {
			browser: Some("FakeBrowser/1.0".to_string()),
			web_socket_debugger_url: None,
		})
	}

	async fn launch(&self, _port: u16) -> Result<()> {
		Ok(())
	}

	fn open(&self, _port: u16) -> Result<Arc<dyn SessionClient>> {
		Ok(self.browser.clone())
	}
}

async fn connected_manager(browser: Arc<FakeBrowser>) -> (Arc<ConnectionManager>, mpsc::Receiver<restbreak_core::browser::ConnectionEvent>) {
	let (tx, rx) = mpsc::channel(32);
	let manager = Arc::new(ConnectionManager::with_connector(
		Box::new(FakeConnector { browser }),
		&Config::default(),
		tx,
	));
	manager.ensure_connected().await.unwrap();
	(manager, rx)
}

#[tokio::test]
async fn pause_all_twice_is_idempotent_success() {
	let browser = FakeBrowser::new(true, "https://www.bilibili.com/video/1");
	let (manager, _events) = connected_manager(browser.clone()).await;
	let dispatcher = CommandDispatcher::new(manager, &Config::default());

	let first = dispatcher.pause_all().await;
	assert!(first.succeeded);
	assert_eq!(first.affected, 1);

	// Second call finds everything already paused: a no-op success.
	let second = dispatcher.pause_all().await;
	assert!(second.succeeded);
	assert_eq!(second.affected, 0);
	assert!(!*browser.playing.lock().unwrap());
}

#[tokio::test]
async fn resume_after_pause_restores_playback() {
	let browser = FakeBrowser::new(true, "https://www.bilibili.com/video/1");
	let (manager, _events) = connected_manager(browser.clone()).await;
	let dispatcher = CommandDispatcher::new(manager, &Config::default());

	assert!(dispatcher.pause_all().await.succeeded);
	let resumed = dispatcher.resume_all().await;
	assert!(resumed.succeeded);
	assert_eq!(resumed.affected, 1);
	assert!(*browser.playing.lock().unwrap());
}

#[tokio::test]
async fn no_matching_tabs_is_a_benign_zero_effect_outcome() {
	let browser = FakeBrowser::new(true, "https://example.com/");
	let (manager, _events) = connected_manager(browser.clone()).await;
	let dispatcher = CommandDispatcher::new(manager, &Config::default());

	let outcome = dispatcher.pause_all().await;
	assert!(!outcome.succeeded);
	assert_eq!(outcome.affected, 0);
	assert!(outcome.results.is_empty());
	// The unmatched tab was never touched.
	assert_eq!(browser.pause_evals.load(Ordering::Relaxed), 0);
	assert!(*browser.playing.lock().unwrap());
}

#[tokio::test]
async fn monitor_reports_playback_counts_per_matching_tab() {
	let browser = FakeBrowser::new(true, "https://www.bilibili.com/video/1");
	let (manager, _events) = connected_manager(browser.clone()).await;
	let (tx, _rx) = mpsc::channel(8);
	let monitor = PlaybackMonitor::new(manager, &Config::default(), tx);

	let snapshots = monitor.poll_once().await.expect("poll should produce snapshots");
	assert_eq!(snapshots.len(), 1);
	assert_eq!(snapshots[0].playing_count, 1);

	*browser.playing.lock().unwrap() = false;
	let snapshots = monitor.poll_once().await.unwrap();
	assert_eq!(snapshots[0].playing_count, 0);
}

#[tokio::test(start_paused = true)]
async fn full_cycle_pauses_on_rest_and_resumes_on_work() {
	let browser = FakeBrowser::new(true, "https://www.bilibili.com/video/1");
	let (manager, connection_rx) = connected_manager(browser.clone()).await;
	let config = Config::default();
	let dispatcher = Arc::new(CommandDispatcher::new(manager, &config));

	let (timer_tx, timer_rx) = mpsc::channel(64);
	let controller = spawn_timer(timer_tx);

	let (_playback_tx, playback_rx) = mpsc::channel(8);
	let (surface_tx, mut surface_rx) = mpsc::channel(256);
	let coordinator = Coordinator::new(controller.clone(), dispatcher, &config);
	tokio::spawn(coordinator.run(
		EventStreams {
			timer: timer_rx,
			playback: playback_rx,
			connection: connection_rx,
		},
		surface_tx,
	));

	let work = Duration::from_secs(25 * 60);
	let rest = Duration::from_secs(20);
	assert!(controller.start(work, rest).await);

	// Drain surfaced events until the rest phase begins.
	wait_for(&mut surface_rx, |event| matches!(event, AppEvent::RestStarted)).await;
	// The resting update that follows confirms remaining == rest duration.
	let resting = wait_for(&mut surface_rx, |event| {
		matches!(event, AppEvent::Timer { phase: Phase::Resting, .. })
	})
	.await;
	if let AppEvent::Timer { remaining, total, .. } = resting {
		assert_eq!(remaining, rest);
		assert_eq!(total, rest);
	}

	wait_for(&mut surface_rx, |event| matches!(event, AppEvent::RestEnded)).await;
	let next_work = wait_for(&mut surface_rx, |event| {
		matches!(event, AppEvent::Timer { phase: Phase::Working, .. })
	})
	.await;
	if let AppEvent::Timer { remaining, total, .. } = next_work {
		assert_eq!(remaining, work);
		assert_eq!(total, work);
	}

	assert_eq!(browser.pause_evals.load(Ordering::Relaxed), 1, "pause dispatched exactly once");
	assert_eq!(browser.resume_evals.load(Ordering::Relaxed), 1, "resume dispatched exactly once");
	assert!(*browser.playing.lock().unwrap(), "playback resumed after rest");

	controller.shutdown().await;
}

async fn wait_for(rx: &mut mpsc::Receiver<AppEvent>, matches: impl Fn(&AppEvent) -> bool) -> AppEvent {
	timeout(Duration::from_secs(3_600), async {
		loop {
			let event = rx.recv().await.expect("surface channel closed early");
			if matches(&event) {
				return event;
			}
		}
	})
	.await
	.expect("expected event never surfaced")
}
