//! Chromium discovery and launch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Result, RuntimeError};
use crate::discovery::fetch_cdp_endpoint;
use crate::process::{pick_debug_port, pid_is_alive};

const READY_ATTEMPTS: u32 = 50;
const READY_INTERVAL: Duration = Duration::from_millis(200);

/// Returns the first Chromium-family executable found on this machine.
pub fn find_chrome_executable() -> Option<PathBuf> {
	let candidates: &[&str] = if cfg!(target_os = "macos") {
		&[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
		]
	} else if cfg!(target_os = "windows") {
		&["chrome.exe", "msedge.exe", "chromium.exe"]
	} else {
		&[
			"chromium",
			"chromium-browser",
			"google-chrome-stable",
			"google-chrome",
			"/usr/bin/chromium",
			"/usr/bin/chromium-browser",
			"/usr/bin/google-chrome",
			"/snap/bin/chromium",
		]
	};

	candidates.iter().find_map(|candidate| {
		let path = Path::new(candidate);
		if path.is_absolute() {
			path.exists().then(|| path.to_path_buf())
		} else {
			which::which(candidate).ok()
		}
	})
}

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	pub headless: bool,
	pub executable: Option<PathBuf>,
	pub port: Option<u16>,
	pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			headless: true,
			executable: None,
			port: None,
			extra_args: Vec::new(),
		}
	}
}

impl LaunchOptions {
	/// Command-line flags passed to the browser.
	///
	/// Cross-origin frame isolation is switched off so the portal's nested
	/// iframes stay reachable from one renderer.
	pub fn args(&self, port: u16, user_data_dir: &Path) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={port}"),
			format!("--user-data-dir={}", user_data_dir.display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			"--no-sandbox".to_string(),
			"--disable-setuid-sandbox".to_string(),
			"--disable-dev-shm-usage".to_string(),
			"--disable-gpu".to_string(),
			"--disable-web-security".to_string(),
			"--disable-features=IsolateOrigins,site-per-process".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args.extend(self.extra_args.iter().cloned());
		args.push("about:blank".to_string());
		args
	}
}

/// A browser started by this process; killed when dropped.
pub struct BrowserProcess {
	child: Child,
	port: u16,
	ws_url: String,
	_user_data_dir: TempDir,
}

impl BrowserProcess {
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let executable = match &options.executable {
			Some(path) => path.clone(),
			None => find_chrome_executable().ok_or_else(|| RuntimeError::Launch("could not find a Chrome/Chromium executable".into()))?,
		};
		let port = pick_debug_port(options.port)?;
		let user_data_dir = tempfile::Builder::new().prefix("chairside-profile-").tempdir()?;
		let args = options.args(port, user_data_dir.path());

		debug!(target = "chairside.cdp", executable = %executable.display(), port, headless = options.headless, "launching browser");
		let mut child = Command::new(&executable)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| RuntimeError::Launch(format!("failed to start {}: {e}", executable.display())))?;

		let mut last_error = "endpoint not reachable".to_string();
		for _ in 0..READY_ATTEMPTS {
			tokio::time::sleep(READY_INTERVAL).await;

			if let Ok(Some(status)) = child.try_wait() {
				return Err(RuntimeError::Launch(format!("browser exited before its debugging endpoint came up ({status})")));
			}

			match fetch_cdp_endpoint(port).await {
				Ok(info) => {
					info!(target = "chairside.cdp", port, browser = info.browser.as_deref().unwrap_or("unknown"), "browser ready");
					return Ok(Self {
						child,
						port,
						ws_url: info.web_socket_debugger_url,
						_user_data_dir: user_data_dir,
					});
				}
				Err(e) => last_error = e.to_string(),
			}
		}

		Err(RuntimeError::Launch(format!("debugging endpoint on port {port} never came up: {last_error}")))
	}

	pub fn ws_url(&self) -> &str {
		&self.ws_url
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn is_alive(&self) -> bool {
		self.child.id().is_some_and(pid_is_alive)
	}

	pub async fn kill(&mut self) -> Result<()> {
		self.child.kill().await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn args_disable_site_isolation_and_set_port() {
		let options = LaunchOptions::default();
		let args = options.args(9333, Path::new("/tmp/profile"));
		assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
		assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
		assert!(args.contains(&"--disable-features=IsolateOrigins,site-per-process".to_string()));
		assert!(args.contains(&"--headless=new".to_string()));
		assert_eq!(args.last().map(String::as_str), Some("about:blank"));
	}

	#[test]
	fn headful_omits_headless_flag() {
		let options = LaunchOptions {
			headless: false,
			extra_args: vec!["--window-size=1280,900".into()],
			..LaunchOptions::default()
		};
		let args = options.args(9222, Path::new("/tmp/p"));
		assert!(!args.iter().any(|a| a.starts_with("--headless")));
		assert!(args.contains(&"--window-size=1280,900".to_string()));
	}
}
