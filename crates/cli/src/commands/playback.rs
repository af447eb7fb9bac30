//! One-shot pause/resume dispatch across matching tabs.

use std::sync::Arc;

use anyhow::Result;
use restbreak_core::Config;
use restbreak_core::browser::{CommandDispatcher, ConnectionManager, PlaybackAction};
use tokio::sync::mpsc;

pub async fn execute(config: Config, action: PlaybackAction) -> Result<()> {
	let (events_tx, _events_rx) = mpsc::channel(8);
	let manager = Arc::new(ConnectionManager::new(&config, events_tx));
	manager.ensure_connected().await?;

	let dispatcher = CommandDispatcher::new(manager.clone(), &config);
	let outcome = match action {
		PlaybackAction::Pause => dispatcher.pause_all().await,
		PlaybackAction::Resume => dispatcher.resume_all().await,
	};

	if outcome.results.is_empty() {
		println!("no matching tabs; nothing to {}", action.as_str());
	} else if outcome.succeeded {
		println!(
			"{}d playback in {} of {} matching tab(s)",
			action.as_str(),
			outcome.affected,
			outcome.results.len()
		);
	} else {
		anyhow::bail!("{} failed in all {} matching tab(s)", action.as_str(), outcome.results.len());
	}

	manager.shutdown().await;
	Ok(())
}
