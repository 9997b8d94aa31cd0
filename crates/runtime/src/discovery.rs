//! DevTools endpoint discovery.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RuntimeError};

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// Reads `/json/version` from a browser listening on localhost `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
	let mut last_error = "no response".to_string();
	for base in [format!("http://127.0.0.1:{port}"), format!("http://localhost:{port}")] {
		match fetch_version(&base).await {
			Ok(info) => return Ok(info),
			Err(e) => last_error = e.to_string(),
		}
	}
	Err(RuntimeError::Discovery {
		endpoint: format!("port {port}"),
		reason: last_error,
	})
}

/// Turns a configured endpoint into a browser WebSocket URL.
///
/// `ws://` and `wss://` URLs are used as given; anything else is treated as
/// the HTTP base of a DevTools server and queried.
pub async fn resolve_ws_endpoint(endpoint: &str) -> Result<String> {
	if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
		return Ok(endpoint.to_string());
	}
	let info = fetch_version(endpoint.trim_end_matches('/')).await.map_err(|e| RuntimeError::Discovery {
		endpoint: endpoint.to_string(),
		reason: e.to_string(),
	})?;
	Ok(info.web_socket_debugger_url)
}

async fn fetch_version(base: &str) -> std::result::Result<CdpVersionInfo, reqwest::Error> {
	let client = reqwest::Client::builder().timeout(Duration::from_millis(400)).build()?;
	client.get(format!("{base}/json/version")).send().await?.error_for_status()?.json().await
}
