//! Event wiring between the timer, the playback monitor, and the command
//! dispatcher.
//!
//! All cross-component policy lives here, explicitly: rest begins, pause
//! playback; rest ends, resume playback; each with a single delayed retry
//! when the first attempt touched nothing while playback was known active.
//! Optionally (config flag, off by default) the work timer is paused while
//! the monitor sees active playback, so a running video is not interrupted
//! mid-consumption.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::browser::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::browser::manager::ConnectionEvent;
use crate::browser::monitor::PlaybackEvent;
use crate::config::Config;
use crate::timer::{Phase, TimerController, TimerEvent};

/// Delay before the one retry of a zero-effect dispatch.
pub const DISPATCH_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Events surfaced to the embedding layer (CLI/UI).
#[derive(Debug, Clone)]
pub enum AppEvent {
	Timer { phase: Phase, remaining: Duration, total: Duration },
	RestStarted,
	RestEnded,
	Connection { connected: bool, message: String },
}

/// Inbound event streams consumed by [`Coordinator::run`].
pub struct EventStreams {
	pub timer: mpsc::Receiver<TimerEvent>,
	pub playback: mpsc::Receiver<PlaybackEvent>,
	pub connection: mpsc::Receiver<ConnectionEvent>,
}

/// Subscribes to component events and turns them into dispatcher calls and
/// surfaced [`AppEvent`]s.
pub struct Coordinator {
	timer: TimerController,
	dispatcher: Arc<CommandDispatcher>,
	pause_timer_on_playback: bool,
	retry_delay: Duration,
	playback_active: bool,
	phase: Phase,
}

impl Coordinator {
	pub fn new(timer: TimerController, dispatcher: Arc<CommandDispatcher>, config: &Config) -> Self {
		Self {
			timer,
			dispatcher,
			pause_timer_on_playback: config.pause_timer_on_playback,
			retry_delay: DISPATCH_RETRY_DELAY,
			playback_active: false,
			phase: Phase::Idle,
		}
	}

	/// Runs until every inbound stream has closed or the surfaced-event
	/// receiver is dropped. Teardown is cooperative: dropping the streams
	/// stops the loop, and no callback runs afterwards.
	pub async fn run(mut self, mut streams: EventStreams, surface: mpsc::Sender<AppEvent>) {
		loop {
			tokio::select! {
				event = streams.timer.recv() => {
					let Some(event) = event else { break };
					if !self.on_timer_event(event, &surface).await {
						break;
					}
				}
				event = streams.playback.recv() => {
					let Some(event) = event else { break };
					self.on_playback_event(event).await;
				}
				event = streams.connection.recv() => {
					let Some(event) = event else { break };
					let forwarded = surface.send(AppEvent::Connection {
						connected: event.connected,
						message: event.message,
					});
					if forwarded.await.is_err() {
						break;
					}
				}
			}
		}
		debug!(target = "restbreak.coordinator", "event loop stopped");
	}

	async fn on_timer_event(&mut self, event: TimerEvent, surface: &mpsc::Sender<AppEvent>) -> bool {
		match event {
			TimerEvent::Update { phase, remaining, total } => {
				self.phase = phase;
				surface.send(AppEvent::Timer { phase, remaining, total }).await.is_ok()
			}
			TimerEvent::WorkComplete => {
				info!(target = "restbreak.coordinator", "work phase complete; pausing playback");
				if surface.send(AppEvent::RestStarted).await.is_err() {
					return false;
				}
				self.dispatch_with_retry(true).await;
				true
			}
			TimerEvent::RestComplete => {
				info!(target = "restbreak.coordinator", "rest phase complete; resuming playback");
				if surface.send(AppEvent::RestEnded).await.is_err() {
					return false;
				}
				self.dispatch_with_retry(false).await;
				true
			}
		}
	}

	async fn on_playback_event(&mut self, event: PlaybackEvent) {
		self.playback_active = event.playing;
		if self.pause_timer_on_playback && event.playing && self.phase == Phase::Working {
			info!(target = "restbreak.coordinator", "active playback detected; pausing work timer");
			self.timer.pause().await;
		}
	}

	/// One dispatch, retried once after a short delay when the first
	/// attempt affected zero tabs while playback was known to be active.
	async fn dispatch_with_retry(&self, pause: bool) -> DispatchOutcome {
		let first = self.run_dispatch(pause).await;
		if first.affected == 0 && self.playback_active {
			debug!(target = "restbreak.coordinator", pause, "dispatch touched nothing; retrying once");
			tokio::time::sleep(self.retry_delay).await;
			return self.run_dispatch(pause).await;
		}
		first
	}

	async fn run_dispatch(&self, pause: bool) -> DispatchOutcome {
		if pause {
			self.dispatcher.pause_all().await
		} else {
			self.dispatcher.resume_all().await
		}
	}
}
