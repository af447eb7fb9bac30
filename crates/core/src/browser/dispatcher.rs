//! Idempotent pause/resume dispatch across matching tabs.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::manager::ConnectionManager;
use super::monitor::matches_site;
use crate::config::Config;

/// Playback command direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
	Pause,
	Resume,
}

impl PlaybackAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			PlaybackAction::Pause => "pause",
			PlaybackAction::Resume => "resume",
		}
	}
}

/// Per-tab outcome of one dispatch.
#[derive(Debug, Clone)]
pub struct CommandResult {
	pub target_id: String,
	pub action: PlaybackAction,
	pub succeeded: bool,
}

/// Aggregated outcome of a `pause_all`/`resume_all` call.
///
/// `succeeded` holds iff at least one tab actually toggled, or every
/// relevant video was already in the desired state (idempotent no-op). Zero
/// matching tabs yields `succeeded == false` with `affected == 0`, which the
/// coordinator treats as benign, not as an error.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
	pub succeeded: bool,
	pub affected: usize,
	pub results: Vec<CommandResult>,
}

impl DispatchOutcome {
	fn empty() -> Self {
		Self {
			succeeded: false,
			affected: 0,
			results: Vec::new(),
		}
	}
}

/// Builds the per-tab command script: toggles `<video>` elements not already
/// in the desired state, falling back to site player controls when the page
/// exposes no video element.
fn command_script(action: PlaybackAction, selectors: &[String]) -> String {
	let desired_pause = matches!(action, PlaybackAction::Pause);
	let selectors_json = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
	format!(
		r#"(() => {{
	const wantPaused = {desired_pause};
	const videos = Array.from(document.querySelectorAll('video'));
	let toggled = 0, already = 0;
	for (const v of videos) {{
		if (v.paused === wantPaused) {{
			already += 1;
		}} else if (wantPaused) {{
			v.pause();
			toggled += 1;
		}} else {{
			v.play();
			toggled += 1;
		}}
	}}
	if (videos.length === 0) {{
		for (const selector of {selectors_json}) {{
			const control = document.querySelector(selector);
			if (control) {{
				control.click();
				toggled += 1;
				break;
			}}
		}}
	}}
	return {{ found: videos.length, toggled, already }};
}})()"#
	)
}

/// Issues idempotent pause/resume commands to all matching tabs.
pub struct CommandDispatcher {
	manager: Arc<ConnectionManager>,
	site_filters: Vec<String>,
	player_selectors: Vec<String>,
}

impl CommandDispatcher {
	pub fn new(manager: Arc<ConnectionManager>, config: &Config) -> Self {
		Self {
			manager,
			site_filters: config.site_filters.clone(),
			player_selectors: config.player_selectors.clone(),
		}
	}

	pub async fn pause_all(&self) -> DispatchOutcome {
		self.dispatch(PlaybackAction::Pause).await
	}

	pub async fn resume_all(&self) -> DispatchOutcome {
		self.dispatch(PlaybackAction::Resume).await
	}

	async fn dispatch(&self, action: PlaybackAction) -> DispatchOutcome {
		let session = match self.manager.session().await {
			Ok(session) => session,
			Err(err) => {
				debug!(target = "restbreak.dispatch", action = action.as_str(), error = %err, "no session; nothing dispatched");
				return DispatchOutcome::empty();
			}
		};

		let targets = match session.list_targets().await {
			Ok(targets) => targets,
			Err(err) => {
				warn!(target = "restbreak.dispatch", action = action.as_str(), error = %err, "target listing failed");
				self.manager.note_session_error();
				return DispatchOutcome::empty();
			}
		};

		let script = command_script(action, &self.player_selectors);
		let mut results = Vec::new();
		let mut toggled_tabs = 0usize;
		let mut idle_noop = false;

		for target in targets.iter().filter(|t| matches_site(t, &self.site_filters)) {
			// Per-tab attempts are independent; one failure never blocks
			// the rest of the batch.
			match session.evaluate(target, &script).await {
				Ok(value) => {
					let toggled = count(&value, "toggled");
					let found = count(&value, "found");
					let already = count(&value, "already");
					if toggled > 0 {
						toggled_tabs += 1;
					} else if found > 0 && already == found {
						idle_noop = true;
					}
					results.push(CommandResult {
						target_id: target.id.clone(),
						action,
						succeeded: toggled > 0 || (found > 0 && already == found),
					});
				}
				Err(err) => {
					warn!(target = "restbreak.dispatch", target_id = %target.id, action = action.as_str(), error = %err, "command evaluation failed");
					results.push(CommandResult {
						target_id: target.id.clone(),
						action,
						succeeded: false,
					});
				}
			}
		}

		let outcome = DispatchOutcome {
			succeeded: toggled_tabs > 0 || idle_noop,
			affected: toggled_tabs,
			results,
		};
		info!(
			target = "restbreak.dispatch",
			action = action.as_str(),
			affected = outcome.affected,
			succeeded = outcome.succeeded,
			tabs = outcome.results.len(),
			"dispatch finished"
		);
		outcome
	}
}

fn count(value: &Value, key: &str) -> u64 {
	value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pause_script_targets_playing_videos() {
		let script = command_script(PlaybackAction::Pause, &[]);
		assert!(script.contains("wantPaused = true"));
		assert!(script.contains("v.pause()"));
	}

	#[test]
	fn resume_script_targets_paused_videos() {
		let script = command_script(PlaybackAction::Resume, &[]);
		assert!(script.contains("wantPaused = false"));
		assert!(script.contains("v.play()"));
	}

	#[test]
	fn fallback_selectors_are_embedded_json_escaped() {
		let selectors = vec![".bpx-player-ctrl-play".to_string(), "button[aria-label=\"play\"]".to_string()];
		let script = command_script(PlaybackAction::Pause, &selectors);
		assert!(script.contains(r#"[".bpx-player-ctrl-play","button[aria-label=\"play\"]"]"#));
	}
}
