//! Browser executable discovery for launch flows.
//!
//! Edge is preferred, matching the browser the reminder is built around,
//! with Chrome/Chromium/Brave as fallbacks.

use std::path::{Path, PathBuf};

/// Locates a launchable browser executable, honoring an explicit override.
pub fn find_browser_executable(override_path: Option<&Path>) -> Option<String> {
	if let Some(path) = override_path {
		if path.exists() {
			return Some(path.to_string_lossy().to_string());
		}
		return None;
	}

	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		vec![
			"microsoft-edge",
			"microsoft-edge-stable",
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"brave",
			"/usr/bin/microsoft-edge",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	for candidate in candidates {
		if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
			if Path::new(&candidate).exists() {
				return Some(candidate);
			}
		} else if which::which(&candidate).is_ok() {
			return Some(candidate);
		}
	}

	None
}

fn windows_browser_candidates() -> Vec<String> {
	let mut candidates = Vec::new();

	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
	];

	for root in roots {
		for suffix in suffixes {
			let mut path = root.clone();
			for component in *suffix {
				path.push(component);
			}
			candidates.push(path.to_string_lossy().to_string());
		}
	}

	candidates.extend([
		"msedge".to_string(),
		"msedge.exe".to_string(),
		"chrome".to_string(),
		"chrome.exe".to_string(),
		"chromium".to_string(),
		"chromium.exe".to_string(),
	]);

	candidates
}
