//! Long-running work/rest cycle with browser supervision.

use std::sync::Arc;

use anyhow::Result;
use restbreak_core::browser::{CommandDispatcher, ConnectionManager, PlaybackMonitor};
use restbreak_core::browser::manager::spawn_health_loop;
use restbreak_core::{Config, Coordinator, EventStreams, spawn_timer};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::output;

pub async fn execute(config: Config) -> Result<()> {
	let (connection_tx, connection_rx) = mpsc::channel(32);
	let manager = Arc::new(ConnectionManager::new(&config, connection_tx));

	// Browser trouble degrades playback control but never blocks the timer.
	if let Err(err) = manager.ensure_connected().await {
		warn!(target = "restbreak", error = %err, "browser unavailable at startup; timer runs anyway");
	}
	let health = spawn_health_loop(manager.clone(), config.health_interval());

	let (playback_tx, playback_rx) = mpsc::channel(32);
	let monitor = PlaybackMonitor::new(manager.clone(), &config, playback_tx).spawn();

	let (timer_tx, timer_rx) = mpsc::channel(64);
	let timer = spawn_timer(timer_tx);

	let dispatcher = Arc::new(CommandDispatcher::new(manager.clone(), &config));
	let (surface_tx, mut surface_rx) = mpsc::channel(64);
	let coordinator = Coordinator::new(timer.clone(), dispatcher, &config);
	let coordinator = tokio::spawn(coordinator.run(
		EventStreams {
			timer: timer_rx,
			playback: playback_rx,
			connection: connection_rx,
		},
		surface_tx,
	));

	let work = config.work_duration();
	let rest = config.rest_duration();
	info!(
		target = "restbreak",
		work_secs = work.as_secs(),
		rest_secs = rest.as_secs(),
		"starting work/rest cycle"
	);
	if !timer.start(work, rest).await {
		anyhow::bail!("work and rest intervals must both be non-zero");
	}

	loop {
		tokio::select! {
			event = surface_rx.recv() => {
				let Some(event) = event else { break };
				output::print_event(&event);
			}
			_ = tokio::signal::ctrl_c() => {
				println!();
				info!(target = "restbreak", "interrupted; shutting down");
				break;
			}
		}
	}

	timer.shutdown().await;
	health.abort();
	monitor.abort();
	manager.shutdown().await;
	let _ = coordinator.await;
	Ok(())
}
