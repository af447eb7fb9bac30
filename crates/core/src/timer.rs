//! Drift-corrected work/rest timer state machine and its tick loop.
//!
//! The state machine is a plain struct driven by explicit instants so it can
//! be exercised deterministically; [`spawn_timer`] wraps it in a tokio task
//! that ticks on a fixed sub-second interval and answers commands over a
//! channel. Each tick decrements `remaining` by the measured wall-clock delta
//! rather than a fixed step, which absorbs scheduler jitter. The work/rest
//! cycle is continuous once started: rest completion rolls straight into the
//! next work phase, and only `reset()` returns to `Idle`.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Tick cadence; kept under one second so displayed time stays smooth.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Timer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Working,
	Resting,
	Paused,
}

impl Phase {
	pub fn as_str(&self) -> &'static str {
		match self {
			Phase::Idle => "idle",
			Phase::Working => "working",
			Phase::Resting => "resting",
			Phase::Paused => "paused",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Events emitted by the timer, consumed by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
	/// Emitted on every tick and every transition.
	Update { phase: Phase, remaining: Duration, total: Duration },
	/// A work phase finished; rest begins.
	WorkComplete,
	/// A rest phase finished (or was cut short); work begins.
	RestComplete,
}

/// The authoritative work/rest/pause/idle cycle.
///
/// Owned exclusively by the tick loop; mutated only on tick or explicit
/// command. Invariants: `remaining` never goes negative, and `Idle` implies
/// `remaining == 0`.
#[derive(Debug)]
pub struct TimerState {
	phase: Phase,
	resume_phase: Phase,
	work_duration: Duration,
	rest_duration: Duration,
	remaining: Duration,
	last_tick: Instant,
	events: Vec<TimerEvent>,
}

impl TimerState {
	pub fn new(now: Instant) -> Self {
		Self {
			phase: Phase::Idle,
			resume_phase: Phase::Working,
			work_duration: Duration::from_secs(25 * 60),
			rest_duration: Duration::from_secs(20),
			remaining: Duration::ZERO,
			last_tick: now,
			events: Vec::new(),
		}
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn remaining(&self) -> Duration {
		self.remaining
	}

	/// Whether the tick loop should be decrementing.
	pub fn is_running(&self) -> bool {
		matches!(self.phase, Phase::Working | Phase::Resting)
	}

	fn total(&self) -> Duration {
		let phase = if self.phase == Phase::Paused { self.resume_phase } else { self.phase };
		match phase {
			Phase::Working => self.work_duration,
			Phase::Resting => self.rest_duration,
			_ => Duration::ZERO,
		}
	}

	fn push_update(&mut self) {
		self.events.push(TimerEvent::Update {
			phase: self.phase,
			remaining: self.remaining,
			total: self.total(),
		});
	}

	/// Starts a work/rest cycle, or resumes when paused.
	///
	/// Returns `false` from `Working`/`Resting` (already running) and for
	/// zero durations, which would complete a phase on the first tick. From
	/// `Paused` the supplied durations are ignored and the pre-pause phase
	/// continues with its retained `remaining`.
	pub fn start(&mut self, work: Duration, rest: Duration, now: Instant) -> bool {
		match self.phase {
			Phase::Working | Phase::Resting => false,
			Phase::Paused => self.resume(now),
			Phase::Idle => {
				if work.is_zero() || rest.is_zero() {
					return false;
				}
				self.work_duration = work;
				self.rest_duration = rest;
				self.remaining = self.work_duration;
				self.last_tick = now;
				self.phase = Phase::Working;
				self.push_update();
				true
			}
		}
	}

	fn resume(&mut self, now: Instant) -> bool {
		// Re-arm last_tick so the delta spanning the pause is discarded.
		self.last_tick = now;
		self.phase = self.resume_phase;
		self.push_update();
		true
	}

	/// Pauses the timer. Policy decision: valid from `Working` only;
	/// pausing during rest is rejected.
	pub fn pause(&mut self) -> bool {
		if self.phase != Phase::Working {
			return false;
		}
		self.resume_phase = self.phase;
		self.phase = Phase::Paused;
		self.push_update();
		true
	}

	/// Returns to `Idle` from any state with `remaining == 0`.
	pub fn reset(&mut self) -> bool {
		self.phase = Phase::Idle;
		self.remaining = Duration::ZERO;
		self.push_update();
		true
	}

	/// Cuts a rest short: emits rest-complete and immediately starts a new
	/// work phase with the original work duration. Rejected outside
	/// `Resting`.
	pub fn finish_rest_early(&mut self, now: Instant) -> bool {
		if self.phase != Phase::Resting {
			return false;
		}
		self.events.push(TimerEvent::RestComplete);
		self.begin_phase(Phase::Working, now);
		true
	}

	/// Advances the countdown by the wall-clock delta since the last tick.
	pub fn tick(&mut self, now: Instant) {
		if !self.is_running() {
			return;
		}
		let elapsed = now.saturating_duration_since(self.last_tick);
		self.last_tick = now;
		self.remaining = self.remaining.saturating_sub(elapsed);
		self.push_update();
		if self.remaining.is_zero() {
			self.complete_phase(now);
		}
	}

	fn complete_phase(&mut self, now: Instant) {
		match self.phase {
			Phase::Working => {
				self.events.push(TimerEvent::WorkComplete);
				self.begin_phase(Phase::Resting, now);
			}
			Phase::Resting => {
				self.events.push(TimerEvent::RestComplete);
				self.begin_phase(Phase::Working, now);
			}
			_ => {}
		}
	}

	fn begin_phase(&mut self, phase: Phase, now: Instant) {
		self.phase = phase;
		self.remaining = match phase {
			Phase::Working => self.work_duration,
			Phase::Resting => self.rest_duration,
			_ => Duration::ZERO,
		};
		self.last_tick = now;
		self.push_update();
	}

	/// Takes all events produced since the last drain.
	pub fn drain_events(&mut self) -> Vec<TimerEvent> {
		std::mem::take(&mut self.events)
	}
}

/// Commands accepted by the tick loop. Each carries a oneshot ack so the
/// caller learns whether the transition was accepted.
#[derive(Debug)]
enum TimerCommand {
	Start { work: Duration, rest: Duration, ack: oneshot::Sender<bool> },
	Pause { ack: oneshot::Sender<bool> },
	Reset { ack: oneshot::Sender<bool> },
	FinishRestEarly { ack: oneshot::Sender<bool> },
	Shutdown,
}

/// Cloneable handle for issuing timer commands.
#[derive(Clone)]
pub struct TimerController {
	tx: mpsc::Sender<TimerCommand>,
}

impl TimerController {
	pub async fn start(&self, work: Duration, rest: Duration) -> bool {
		let (ack, rx) = oneshot::channel();
		if self.tx.send(TimerCommand::Start { work, rest, ack }).await.is_err() {
			return false;
		}
		rx.await.unwrap_or(false)
	}

	pub async fn pause(&self) -> bool {
		self.send_simple(|ack| TimerCommand::Pause { ack }).await
	}

	pub async fn reset(&self) -> bool {
		self.send_simple(|ack| TimerCommand::Reset { ack }).await
	}

	pub async fn finish_rest_early(&self) -> bool {
		self.send_simple(|ack| TimerCommand::FinishRestEarly { ack }).await
	}

	/// Stops the tick loop. No events are emitted afterwards.
	pub async fn shutdown(&self) {
		let _ = self.tx.send(TimerCommand::Shutdown).await;
	}

	async fn send_simple(&self, build: impl FnOnce(oneshot::Sender<bool>) -> TimerCommand) -> bool {
		let (ack, rx) = oneshot::channel();
		if self.tx.send(build(ack)).await.is_err() {
			return false;
		}
		rx.await.unwrap_or(false)
	}
}

/// Spawns the tick loop and returns its command handle. Timer events flow
/// into `events`; the loop exits when the controller is dropped or
/// [`TimerController::shutdown`] is called.
pub fn spawn_timer(events: mpsc::Sender<TimerEvent>) -> TimerController {
	let (tx, rx) = mpsc::channel(16);
	tokio::spawn(run_timer(rx, events));
	TimerController { tx }
}

async fn run_timer(mut commands: mpsc::Receiver<TimerCommand>, events: mpsc::Sender<TimerEvent>) {
	let mut state = TimerState::new(Instant::now());
	let mut ticker = time::interval(TICK_INTERVAL);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			command = commands.recv() => {
				let Some(command) = command else { break };
				let now = Instant::now();
				match command {
					TimerCommand::Start { work, rest, ack } => {
						let accepted = state.start(work, rest, now);
						info!(target = "restbreak.timer", %accepted, phase = %state.phase(), "start");
						let _ = ack.send(accepted);
					}
					TimerCommand::Pause { ack } => {
						let accepted = state.pause();
						info!(target = "restbreak.timer", %accepted, "pause");
						let _ = ack.send(accepted);
					}
					TimerCommand::Reset { ack } => {
						let accepted = state.reset();
						info!(target = "restbreak.timer", "reset");
						let _ = ack.send(accepted);
					}
					TimerCommand::FinishRestEarly { ack } => {
						let accepted = state.finish_rest_early(now);
						info!(target = "restbreak.timer", %accepted, "finish rest early");
						let _ = ack.send(accepted);
					}
					TimerCommand::Shutdown => break,
				}
				flush(&mut state, &events).await;
			}
			// Guarded so no tick lands once pause()/reset() has been acked.
			_ = ticker.tick(), if state.is_running() => {
				state.tick(Instant::now());
				flush(&mut state, &events).await;
			}
		}
	}
	debug!(target = "restbreak.timer", "tick loop stopped");
}

async fn flush(state: &mut TimerState, events: &mpsc::Sender<TimerEvent>) {
	for event in state.drain_events() {
		if events.send(event).await.is_err() {
			return;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn secs(n: u64) -> Duration {
		Duration::from_secs(n)
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	fn started(work: u64, rest: u64) -> (TimerState, Instant) {
		let base = Instant::now();
		let mut state = TimerState::new(base);
		assert!(state.start(secs(work), secs(rest), base));
		state.drain_events();
		(state, base)
	}

	#[test]
	fn initial_state_is_idle_with_zero_remaining() {
		let state = TimerState::new(Instant::now());
		assert_eq!(state.phase(), Phase::Idle);
		assert_eq!(state.remaining(), Duration::ZERO);
	}

	#[test]
	fn start_moves_idle_to_working() {
		let base = Instant::now();
		let mut state = TimerState::new(base);
		assert!(state.start(secs(300), secs(10), base));
		assert_eq!(state.phase(), Phase::Working);
		assert_eq!(state.remaining(), secs(300));
		assert_eq!(
			state.drain_events(),
			vec![TimerEvent::Update {
				phase: Phase::Working,
				remaining: secs(300),
				total: secs(300),
			}]
		);
	}

	#[test]
	fn start_rejects_zero_durations_from_idle() {
		let base = Instant::now();
		let mut state = TimerState::new(base);
		assert!(!state.start(Duration::ZERO, Duration::ZERO, base));
		assert!(!state.start(secs(300), Duration::ZERO, base));
		assert!(!state.start(Duration::ZERO, secs(10), base));
		assert_eq!(state.phase(), Phase::Idle);
		assert!(state.drain_events().is_empty(), "rejected start emits nothing");
	}

	#[test]
	fn start_is_rejected_while_running() {
		let (mut state, base) = started(300, 10);
		assert!(!state.start(secs(60), secs(5), base));
		assert_eq!(state.remaining(), secs(300), "rejected start must not touch durations");
	}

	#[test]
	fn pause_is_working_only_and_start_resumes() {
		let (mut state, base) = started(300, 10);
		state.tick(base + secs(5));
		assert!(state.pause());
		assert_eq!(state.phase(), Phase::Paused);
		let held = state.remaining();

		// Durations passed to a resuming start are ignored.
		assert!(state.start(secs(1), secs(1), base + secs(60)));
		assert_eq!(state.phase(), Phase::Working);
		assert_eq!(state.remaining(), held);

		// The 55 s spent paused is discarded, not counted.
		state.drain_events();
		state.tick(base + secs(61));
		assert_eq!(state.remaining(), held - secs(1));
	}

	#[test]
	fn pause_rejected_outside_working() {
		let base = Instant::now();
		let mut state = TimerState::new(base);
		assert!(!state.pause(), "idle");

		let (mut resting, base) = started(1, 10);
		resting.tick(base + secs(1));
		assert_eq!(resting.phase(), Phase::Resting);
		assert!(!resting.pause(), "resting");
	}

	#[test]
	fn remaining_is_monotonic_and_never_negative() {
		let (mut state, base) = started(2, 1);
		let mut previous = state.remaining();
		for step in 1..=40u64 {
			state.tick(base + ms(step * 100));
			if state.remaining() > previous {
				// Allowed only at a phase boundary refill.
				assert!(!state.drain_events().is_empty());
			}
			previous = state.remaining();
		}
		// Way past both phases: still a valid non-negative duration.
		state.tick(base + secs(60));
		assert!(state.remaining() <= state.total());
	}

	#[test]
	fn work_completion_rolls_into_rest_without_gap() {
		let (mut state, base) = started(1, 10);
		state.tick(base + ms(1_100));
		assert_eq!(state.phase(), Phase::Resting);
		assert_eq!(state.remaining(), secs(10));
		let events = state.drain_events();
		assert!(events.contains(&TimerEvent::WorkComplete));
		assert!(events.contains(&TimerEvent::Update {
			phase: Phase::Resting,
			remaining: secs(10),
			total: secs(10),
		}));
	}

	#[test]
	fn rest_completion_starts_next_work_phase() {
		let (mut state, base) = started(1, 1);
		state.tick(base + ms(1_100));
		assert_eq!(state.phase(), Phase::Resting);
		state.drain_events();

		state.tick(base + ms(2_200));
		assert_eq!(state.phase(), Phase::Working);
		assert_eq!(state.remaining(), secs(1));
		assert!(state.drain_events().contains(&TimerEvent::RestComplete));
	}

	#[test]
	fn reset_returns_to_idle_from_any_state() {
		let (mut state, base) = started(300, 10);
		state.tick(base + secs(5));
		assert!(state.reset());
		assert_eq!(state.phase(), Phase::Idle);
		assert_eq!(state.remaining(), Duration::ZERO);

		// Ticking while idle produces no further events.
		state.drain_events();
		state.tick(base + secs(10));
		assert!(state.drain_events().is_empty());
	}

	#[test]
	fn finish_rest_early_requires_resting() {
		let (mut state, base) = started(300, 10);
		assert!(!state.finish_rest_early(base + secs(1)));
		assert_eq!(state.phase(), Phase::Working);
	}

	#[test]
	fn finish_rest_early_starts_work_with_original_duration() {
		let (mut state, base) = started(1, 10);
		state.tick(base + ms(1_100));
		assert_eq!(state.phase(), Phase::Resting);
		state.drain_events();

		assert!(state.finish_rest_early(base + secs(3)));
		assert_eq!(state.phase(), Phase::Working);
		assert_eq!(state.remaining(), secs(1));
		let events = state.drain_events();
		assert_eq!(events[0], TimerEvent::RestComplete);
	}

	#[test]
	fn jittered_ticks_reach_transition_within_one_interval() {
		// 10 s of work fed as 250 ms ticks with alternating ±60 ms jitter.
		let (mut state, base) = started(10, 5);
		let mut elapsed = Duration::ZERO;
		let mut step = 0u64;
		while state.phase() == Phase::Working {
			let jitter: i64 = if step % 2 == 0 { 60 } else { -60 };
			let delta = ms((250i64 + jitter) as u64);
			elapsed += delta;
			state.tick(base + elapsed);
			step += 1;
			assert!(elapsed < secs(12), "transition never happened");
		}
		let target = secs(10);
		assert!(elapsed >= target);
		assert!(elapsed - target <= TICK_INTERVAL + ms(60), "elapsed {elapsed:?} drifted past one tick of {target:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn loop_emits_no_updates_after_reset() {
		let (tx, mut rx) = mpsc::channel(64);
		let controller = spawn_timer(tx);

		assert!(controller.start(secs(30), secs(5)).await);
		tokio::time::advance(secs(2)).await;
		assert!(controller.reset().await);

		// Drain everything emitted so far, then verify silence.
		while rx.try_recv().is_ok() {}
		tokio::time::advance(secs(5)).await;
		tokio::task::yield_now().await;
		assert!(rx.try_recv().is_err());

		controller.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn loop_ticks_down_in_real_cadence() {
		let (tx, mut rx) = mpsc::channel(256);
		let controller = spawn_timer(tx);
		assert!(controller.start(secs(2), secs(1)).await);

		tokio::time::sleep(secs(3)).await;
		tokio::task::yield_now().await;
		controller.shutdown().await;

		let mut saw_work_complete = false;
		let mut saw_rest_complete = false;
		while let Ok(event) = rx.try_recv() {
			match event {
				TimerEvent::WorkComplete => saw_work_complete = true,
				TimerEvent::RestComplete => saw_rest_complete = true,
				TimerEvent::Update { remaining, total, .. } => assert!(remaining <= total),
			}
		}
		assert!(saw_work_complete);
		assert!(saw_rest_complete);
	}
}
