//! One-shot connectivity check against the debugging endpoint.

use anyhow::Result;
use restbreak_core::Config;
use restbreak_core::browser::ConnectionManager;
use tokio::sync::mpsc;

pub async fn execute(config: Config) -> Result<()> {
	let (events_tx, _events_rx) = mpsc::channel(8);
	let manager = ConnectionManager::new(&config, events_tx);

	manager.ensure_connected().await?;
	let state = manager.state();
	let session = manager.session().await?;
	let targets = session.list_targets().await?;
	let pages = targets.iter().filter(|t| t.is_page()).count();

	println!("connected on port {}", state.debug_port);
	println!("{} page tab(s), {} target(s) total", pages, targets.len());

	manager.shutdown().await;
	Ok(())
}
