//! Engine configuration.
//!
//! Every struct deserializes from camelCase JSON with defaults for missing
//! fields, so an empty `{}` is a complete configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const USERNAME_ENV: &str = "CHAIRSIDE_USERNAME";
pub const PASSWORD_ENV: &str = "CHAIRSIDE_PASSWORD";

/// Portal endpoints and the account used to sign in.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalConfig {
	pub login_url: String,
	/// Page that only renders for an authenticated session.
	pub protected_url: String,
	/// Patient overview page, reloaded when a stale detail view is detected.
	pub overview_url: String,
	pub username: Option<String>,
	#[serde(skip_serializing)]
	pub password: Option<String>,
}

impl Default for PortalConfig {
	fn default() -> Self {
		Self {
			login_url: "https://www.denticon.com/login".into(),
			protected_url: "https://a1.denticon.com/aspx/home/advancedmypage.aspx?chk=tls".into(),
			overview_url: "https://a1.denticon.com/ASPX/Patients/AdvancedPatientOverview.aspx".into(),
			username: None,
			password: None,
		}
	}
}

impl std::fmt::Debug for PortalConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PortalConfig")
			.field("login_url", &self.login_url)
			.field("protected_url", &self.protected_url)
			.field("overview_url", &self.overview_url)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

impl PortalConfig {
	/// Resolves credentials from the file, falling back to the environment.
	pub fn credentials(&self) -> Result<Credentials> {
		let username = self.username.clone().or_else(|| std::env::var(USERNAME_ENV).ok());
		let password = self.password.clone().or_else(|| std::env::var(PASSWORD_ENV).ok());
		match (username, password) {
			(Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => Ok(Credentials { username, password }),
			_ => Err(Error::Config(format!("portal credentials missing; set {USERNAME_ENV} and {PASSWORD_ENV}"))),
		}
	}
}

#[derive(Clone)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credentials").field("username", &self.username).finish_non_exhaustive()
	}
}

/// Snapshot location and freshness windows, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
	pub snapshot_path: PathBuf,
	/// Lifetime the portal grants an authenticated session.
	pub session_lifetime_mins: u64,
	pub max_age_mins: u64,
	pub refresh_interval_mins: u64,
	pub watchdog_interval_mins: u64,
	pub stale_after_mins: u64,
}

impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			snapshot_path: PathBuf::from("cookies.json"),
			session_lifetime_mins: 120,
			max_age_mins: 115,
			refresh_interval_mins: 110,
			watchdog_interval_mins: 30,
			stale_after_mins: 130,
		}
	}
}

/// Upper bound for every window in [`SessionSettings`]: one week.
pub const MAX_WINDOW_MINS: u64 = 7 * 24 * 60;

const fn minutes(m: u64) -> Duration {
	Duration::from_secs(m.saturating_mul(60))
}

impl SessionSettings {
	/// Enforces `refresh interval < max age < session lifetime`, with every
	/// window at most [`MAX_WINDOW_MINS`].
	pub fn validate(&self) -> Result<()> {
		if self.refresh_interval_mins == 0 || self.watchdog_interval_mins == 0 {
			return Err(Error::Config("refresh and watchdog intervals must be positive".into()));
		}
		let windows = [
			("sessionLifetimeMins", self.session_lifetime_mins),
			("maxAgeMins", self.max_age_mins),
			("refreshIntervalMins", self.refresh_interval_mins),
			("watchdogIntervalMins", self.watchdog_interval_mins),
			("staleAfterMins", self.stale_after_mins),
		];
		if let Some((name, value)) = windows.into_iter().find(|(_, value)| *value > MAX_WINDOW_MINS) {
			return Err(Error::Config(format!("{name} ({value}) exceeds {MAX_WINDOW_MINS} minutes")));
		}
		if self.refresh_interval_mins >= self.max_age_mins {
			return Err(Error::Config(format!(
				"refreshIntervalMins ({}) must be shorter than maxAgeMins ({})",
				self.refresh_interval_mins, self.max_age_mins
			)));
		}
		if self.max_age_mins >= self.session_lifetime_mins {
			return Err(Error::Config(format!(
				"maxAgeMins ({}) must be shorter than sessionLifetimeMins ({})",
				self.max_age_mins, self.session_lifetime_mins
			)));
		}
		Ok(())
	}

	pub fn max_age(&self) -> Duration {
		minutes(self.max_age_mins)
	}

	pub fn refresh_interval(&self) -> Duration {
		minutes(self.refresh_interval_mins)
	}

	pub fn watchdog_interval(&self) -> Duration {
		minutes(self.watchdog_interval_mins)
	}

	pub fn stale_after(&self) -> Duration {
		minutes(self.stale_after_mins)
	}
}

/// How a lookup obtains an authenticated context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPolicy {
	/// Inject the lifecycle manager's snapshot, logging in inline only when it is missing or rejected.
	#[default]
	Reuse,
	/// Sign in from scratch on every lookup.
	FreshLogin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupSettings {
	pub policy: SessionPolicy,
	/// Pause after submitting the search, before the stale view check.
	pub classify_settle_ms: u64,
	/// Pause after reading the overview, before opening the treatment plan.
	pub detail_settle_ms: u64,
	pub screenshot_dir: PathBuf,
	pub overlay_selectors: Vec<String>,
	pub max_treatment_rows: usize,
}

impl Default for LookupSettings {
	fn default() -> Self {
		Self {
			policy: SessionPolicy::Reuse,
			classify_settle_ms: 2_000,
			detail_settle_ms: 7_000,
			screenshot_dir: PathBuf::from("screenshots"),
			overlay_selectors: vec!["#overlay-menubar".into(), ".ui-widget-overlay".into()],
			max_treatment_rows: 50,
		}
	}
}

impl LookupSettings {
	pub fn classify_settle(&self) -> Duration {
		Duration::from_millis(self.classify_settle_ms)
	}

	pub fn detail_settle(&self) -> Duration {
		Duration::from_millis(self.detail_settle_ms)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
	pub headless: bool,
	/// Existing DevTools endpoint (`http://host:port` or `ws://...`); skips launching.
	pub cdp_endpoint: Option<String>,
	pub executable: Option<PathBuf>,
	pub debug_port: Option<u16>,
	pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
	fn default() -> Self {
		Self {
			headless: true,
			cdp_endpoint: None,
			executable: None,
			debug_port: None,
			extra_args: Vec::new(),
		}
	}
}
