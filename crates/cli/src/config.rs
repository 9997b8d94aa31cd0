//! `chairside.json` loading and command-line overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chairside::{BrowserSettings, LookupSettings, PortalConfig, SessionSettings};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::branches::BranchTable;
use crate::error::{CliError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "chairside.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
	pub bind: String,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self { bind: "0.0.0.0:3000".into() }
	}
}

impl ServerSettings {
	pub fn socket_addr(&self) -> Result<SocketAddr> {
		self.bind.parse().map_err(|_| CliError::InvalidBind { addr: self.bind.clone() })
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
	pub portal: PortalConfig,
	pub session: SessionSettings,
	pub lookup: LookupSettings,
	pub browser: BrowserSettings,
	pub server: ServerSettings,
	pub branches: BranchTable,
}

/// Flag values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub bind: Option<String>,
	pub headed: bool,
	pub cdp_endpoint: Option<String>,
	pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
	/// Reads `path`. A missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let content = match std::fs::read_to_string(path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				debug!(target = "chairside.http", path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(CliError::ConfigRead {
					path: path.to_path_buf(),
					source,
				});
			}
		};
		let config: Self = serde_json::from_str(&content).map_err(|source| CliError::ConfigParse {
			path: path.to_path_buf(),
			source,
		})?;
		config.session.validate()?;
		Ok(config)
	}

	pub fn apply(&mut self, overrides: &Overrides) {
		if let Some(bind) = &overrides.bind {
			self.server.bind = bind.clone();
		}
		if overrides.headed {
			self.browser.headless = false;
		}
		if let Some(endpoint) = &overrides.cdp_endpoint {
			self.browser.cdp_endpoint = Some(endpoint.clone());
		}
		if let Some(path) = &overrides.snapshot_path {
			self.session.snapshot_path = path.clone();
		}
	}
}
