//! Playback polling across matching tabs.
//!
//! The monitor never mutates page state: its probe script only counts
//! visible `<video>` elements and how many are actively playing. Polls run
//! on a fixed interval and never overlap; the loop awaits one poll before
//! sleeping toward the next.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::cdp::Target;
use super::manager::ConnectionManager;
use crate::config::Config;

/// Per-target playback counts from one poll. Transient; consumed by the
/// coordinator and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
	pub target_id: String,
	pub video_count: u32,
	pub playing_count: u32,
}

/// One poll's aggregated outcome.
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
	pub playing: bool,
	pub snapshots: Vec<PlaybackSnapshot>,
}

/// Builds the read-only probe script. Videos that are hidden, smaller than
/// `min_area` px² (thumbnail and ad players), or paused with
/// picture-in-picture disabled are excluded from the counted set.
pub fn probe_script(min_area: u32) -> String {
	format!(
		r#"(() => {{
	const visible = (v) => {{
		const rect = v.getBoundingClientRect();
		const style = window.getComputedStyle(v);
		if (style.display === 'none' || style.visibility === 'hidden') return false;
		if (v.disablePictureInPicture && v.paused) return false;
		return rect.width * rect.height >= {min_area};
	}};
	const videos = Array.from(document.querySelectorAll('video')).filter(visible);
	const playing = videos.filter(v =>
		!v.paused && !v.ended && v.currentTime > 0 && v.readyState > 2);
	return {{ total: videos.length, playing: playing.length }};
}})()"#
	)
}

/// Returns whether `target` is a page matching the configured site filters.
/// An empty filter list matches every page target.
pub fn matches_site(target: &Target, filters: &[String]) -> bool {
	if !target.is_page() {
		return false;
	}
	filters.is_empty() || filters.iter().any(|needle| target.url.contains(needle.as_str()))
}

/// Polls the session for active video playback on a fixed interval.
pub struct PlaybackMonitor {
	manager: Arc<ConnectionManager>,
	events: mpsc::Sender<PlaybackEvent>,
	site_filters: Vec<String>,
	interval: Duration,
	script: String,
}

impl PlaybackMonitor {
	pub fn new(manager: Arc<ConnectionManager>, config: &Config, events: mpsc::Sender<PlaybackEvent>) -> Self {
		Self {
			manager,
			events,
			site_filters: config.site_filters.clone(),
			interval: config.poll_interval(),
			script: probe_script(config.min_video_area),
		}
	}

	/// One poll pass. Returns `None` when any evaluation failed, in which
	/// case this cycle emits no event; errors are reported to the manager
	/// for health accounting and never retried within the same poll.
	pub async fn poll_once(&self) -> Option<Vec<PlaybackSnapshot>> {
		let session = match self.manager.session().await {
			Ok(session) => session,
			Err(_) => return None,
		};

		let targets = match session.list_targets().await {
			Ok(targets) => targets,
			Err(err) => {
				warn!(target = "restbreak.monitor", error = %err, "target listing failed");
				self.manager.note_session_error();
				return None;
			}
		};

		let mut snapshots = Vec::new();
		for target in targets.iter().filter(|t| matches_site(t, &self.site_filters)) {
			match session.evaluate(target, &self.script).await {
				Ok(value) => snapshots.push(parse_snapshot(&target.id, &value)),
				Err(err) => {
					warn!(target = "restbreak.monitor", target_id = %target.id, error = %err, "playback probe failed");
					self.manager.note_session_error();
					return None;
				}
			}
		}
		Some(snapshots)
	}

	/// Runs the poll loop until the event receiver is dropped.
	pub fn spawn(self) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				if let Some(snapshots) = self.poll_once().await {
					let playing = snapshots.iter().any(|s| s.playing_count > 0);
					if playing {
						debug!(target = "restbreak.monitor", tabs = snapshots.len(), "active playback detected");
					}
					if self.events.send(PlaybackEvent { playing, snapshots }).await.is_err() {
						break;
					}
				}
				tokio::time::sleep(self.interval).await;
			}
		})
	}
}

fn parse_snapshot(target_id: &str, value: &Value) -> PlaybackSnapshot {
	let count = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
	PlaybackSnapshot {
		target_id: target_id.to_string(),
		video_count: count("total"),
		playing_count: count("playing"),
	}
}
