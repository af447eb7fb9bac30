//! Runtime configuration with per-field defaults and JSON file loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ControlError, Result};

/// Default remote-debugging port probed before the fallback scan.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// Resolved runtime configuration.
///
/// Every field has a default so a missing or partial config file still
/// yields a working setup; CLI flags override individual values on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Work interval in seconds.
	pub work_seconds: u64,
	/// Rest interval in seconds.
	pub rest_seconds: u64,
	/// Remote-debugging port probed first.
	pub debug_port: u16,
	/// Number of ports scanned above `debug_port` when it is occupied
	/// by a non-debugging process.
	pub fallback_ports: u16,
	/// Playback poll cadence in milliseconds.
	pub poll_interval_ms: u64,
	/// Connection health-check cadence in milliseconds.
	pub health_interval_ms: u64,
	/// Bounded connect retry count.
	pub connect_retries: u32,
	/// Fixed backoff between connect retries, in milliseconds.
	pub connect_backoff_ms: u64,
	/// Consecutive health-check failures tolerated before the manager
	/// gives up until an explicit retry.
	pub max_health_failures: u32,
	/// URL substrings selecting which tabs are controlled. Empty means
	/// every page target.
	pub site_filters: Vec<String>,
	/// Site-specific player control selectors tried when a tab exposes
	/// no `<video>` element.
	pub player_selectors: Vec<String>,
	/// Pause the work timer while the monitor sees active playback.
	pub pause_timer_on_playback: bool,
	/// Minimum visible video area (px²) counted by the playback probe;
	/// filters out thumbnail/ad players.
	pub min_video_area: u32,
	/// Explicit browser executable, overriding platform discovery.
	pub browser_path: Option<PathBuf>,
	/// Profile directory passed to a launched browser.
	pub user_data_dir: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			work_seconds: 25 * 60,
			rest_seconds: 20,
			debug_port: DEFAULT_DEBUG_PORT,
			fallback_ports: 10,
			poll_interval_ms: 5_000,
			health_interval_ms: 15_000,
			connect_retries: 3,
			connect_backoff_ms: 1_500,
			max_health_failures: 3,
			site_filters: vec!["bilibili.com".to_string()],
			player_selectors: vec![
				".bpx-player-ctrl-play".to_string(),
				".bilibili-player-video-btn-start".to_string(),
			],
			pause_timer_on_playback: false,
			min_video_area: 40_000,
			browser_path: None,
			user_data_dir: None,
		}
	}
}

impl Config {
	/// Loads configuration from a JSON file.
	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path)?;
		serde_json::from_str(&raw).map_err(|e| ControlError::Context(format!("invalid config {}: {}", path.display(), e)))
	}

	/// Loads `path` when given, falling back to defaults when absent.
	pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}

	pub fn work_duration(&self) -> Duration {
		Duration::from_secs(self.work_seconds)
	}

	pub fn rest_duration(&self) -> Duration {
		Duration::from_secs(self.rest_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn health_interval(&self) -> Duration {
		Duration::from_millis(self.health_interval_ms)
	}

	pub fn connect_backoff(&self) -> Duration {
		Duration::from_millis(self.connect_backoff_ms)
	}
}
