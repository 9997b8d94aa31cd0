use std::sync::Arc;

use async_trait::async_trait;
use chairside_runtime::{BrowserProcess, CdpConnection, LaunchOptions, resolve_ws_endpoint};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::page::CdpPage;
use crate::config::BrowserSettings;
use crate::driver::{Browser, PortalPage};
use crate::error::{Error, Result};

/// A connected browser, launched by us or reached through a configured endpoint.
pub struct CdpBrowser {
	conn: Arc<CdpConnection>,
	_process: Option<BrowserProcess>,
}

impl CdpBrowser {
	pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
		if let Some(endpoint) = &settings.cdp_endpoint {
			let ws_url = resolve_ws_endpoint(endpoint).await?;
			info!(target = "chairside.cdp", endpoint = %endpoint, "connecting to existing browser");
			let conn = CdpConnection::connect(&ws_url).await?;
			return Ok(Self {
				conn: Arc::new(conn),
				_process: None,
			});
		}

		let options = LaunchOptions {
			headless: settings.headless,
			executable: settings.executable.clone(),
			port: settings.debug_port,
			extra_args: settings.extra_args.clone(),
		};
		let process = BrowserProcess::launch(&options).await?;
		let conn = CdpConnection::connect(process.ws_url()).await?;
		Ok(Self {
			conn: Arc::new(conn),
			_process: Some(process),
		})
	}

	pub fn is_connected(&self) -> bool {
		!self.conn.is_closed()
	}
}

#[async_trait]
impl Browser for CdpBrowser {
	async fn new_context(&self) -> Result<Box<dyn PortalPage>> {
		let context = self.conn.call("Target.createBrowserContext", json!({ "disposeOnDetach": true })).await?;
		let context_id = context["browserContextId"]
			.as_str()
			.ok_or_else(|| Error::Driver("browser did not return a context id".into()))?
			.to_string();

		let target = self
			.conn
			.call("Target.createTarget", json!({ "url": "about:blank", "browserContextId": context_id }))
			.await?;
		let target_id = target["targetId"]
			.as_str()
			.ok_or_else(|| Error::Driver("browser did not return a target id".into()))?
			.to_string();

		let attached = self
			.conn
			.call("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }))
			.await?;
		let session_id = attached["sessionId"]
			.as_str()
			.ok_or_else(|| Error::Driver("browser did not return a session id".into()))?
			.to_string();

		let page = CdpPage::attach(Arc::clone(&self.conn), context_id, target_id, session_id).await?;
		Ok(Box::new(page))
	}
}

/// Browser handle shared by the scheduler and lookups.
///
/// Launches lazily and relaunches when the previous browser's connection dropped.
pub struct SharedBrowser {
	settings: BrowserSettings,
	current: Mutex<Option<Arc<CdpBrowser>>>,
}

impl SharedBrowser {
	pub fn new(settings: BrowserSettings) -> Self {
		Self {
			settings,
			current: Mutex::new(None),
		}
	}

	async fn browser(&self) -> Result<Arc<CdpBrowser>> {
		let mut current = self.current.lock().await;
		if let Some(browser) = current.as_ref().filter(|b| b.is_connected()) {
			return Ok(Arc::clone(browser));
		}
		if current.is_some() {
			warn!(target = "chairside.cdp", "browser connection lost, relaunching");
		}
		let browser = Arc::new(CdpBrowser::launch(&self.settings).await?);
		*current = Some(Arc::clone(&browser));
		Ok(browser)
	}
}

#[async_trait]
impl Browser for SharedBrowser {
	async fn new_context(&self) -> Result<Box<dyn PortalPage>> {
		self.browser().await?.new_context().await
	}
}
