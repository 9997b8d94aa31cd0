use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chairside_protocol::Cookie;
use chairside_runtime::{CdpConnection, DEFAULT_COMMAND_TIMEOUT, RuntimeError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;

use super::js;
use crate::driver::{ClickOptions, ElementHandle, ElementState, FrameId, PortalPage, Scope, Script, WaitUntil};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const WORLD_NAME: &str = "chairside";

/// One page target inside its own browser context.
pub struct CdpPage {
	conn: Arc<CdpConnection>,
	context_id: String,
	target_id: String,
	session_id: String,
	main_frame: FrameId,
	/// Isolated-world execution context per frame; dropped when a frame navigates.
	worlds: Mutex<HashMap<FrameId, i64>>,
	closed: AtomicBool,
}

impl CdpPage {
	pub(super) async fn attach(conn: Arc<CdpConnection>, context_id: String, target_id: String, session_id: String) -> Result<Self> {
		let call = |method: &'static str| {
			let conn = Arc::clone(&conn);
			let session_id = session_id.clone();
			async move { conn.call_in(Some(&session_id), method, json!({}), DEFAULT_COMMAND_TIMEOUT).await }
		};
		call("Page.enable").await?;
		call("DOM.enable").await?;
		let tree = call("Page.getFrameTree").await?;
		let main_frame = tree["frameTree"]["frame"]["id"]
			.as_str()
			.ok_or_else(|| Error::Driver("page has no main frame".into()))?
			.to_string();

		debug!(target = "chairside.cdp", context = %context_id, target = %target_id, "page attached");
		Ok(Self {
			conn,
			context_id,
			target_id,
			session_id,
			main_frame,
			worlds: Mutex::new(HashMap::new()),
			closed: AtomicBool::new(false),
		})
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.call_with_timeout(method, params, DEFAULT_COMMAND_TIMEOUT).await
	}

	async fn call_with_timeout(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
		Ok(self.conn.call_in(Some(&self.session_id), method, params, timeout).await?)
	}

	fn frame_id<'a>(&'a self, scope: &'a Scope) -> &'a str {
		match scope {
			Scope::Main => &self.main_frame,
			Scope::Frame(id) => id,
		}
	}

	async fn world(&self, frame_id: &str) -> Result<i64> {
		let cached = self.worlds.lock().get(frame_id).copied();
		if let Some(id) = cached {
			return Ok(id);
		}
		let created = self
			.call(
				"Page.createIsolatedWorld",
				json!({ "frameId": frame_id, "worldName": WORLD_NAME, "grantUniveralAccess": true }),
			)
			.await?;
		let id = created["executionContextId"]
			.as_i64()
			.ok_or_else(|| Error::Driver(format!("no execution context for frame {frame_id}")))?;
		self.worlds.lock().insert(frame_id.to_string(), id);
		Ok(id)
	}

	/// Evaluates `expression` in the frame's isolated world, recreating the
	/// world once if the frame navigated since it was cached.
	async fn eval_raw(&self, scope: &Scope, label: &str, expression: &str, by_value: bool) -> Result<Value> {
		let frame_id = self.frame_id(scope);
		let mut retried = false;
		loop {
			let context_id = self.world(frame_id).await?;
			let params = json!({
				"expression": expression,
				"contextId": context_id,
				"returnByValue": by_value,
				"awaitPromise": true,
			});
			let reply = match self.call("Runtime.evaluate", params).await {
				Err(Error::Runtime(RuntimeError::Cdp { message, .. })) if !retried && message.contains("context") => {
					self.worlds.lock().remove(frame_id);
					retried = true;
					continue;
				}
				other => other?,
			};
			if let Some(details) = reply.get("exceptionDetails") {
				let message = details["exception"]["description"]
					.as_str()
					.or_else(|| details["text"].as_str())
					.unwrap_or("script threw")
					.to_string();
				return Err(Error::Script {
					name: label.to_string(),
					message,
				});
			}
			return Ok(reply["result"].clone());
		}
	}

	async fn run(&self, scope: &Scope, script: &Script, arg: Value) -> Result<Value> {
		let expression = format!("({})({})", script.source, arg);
		let result = self.eval_raw(scope, script.name, &expression, true).await?;
		Ok(result.get("value").cloned().unwrap_or(Value::Null))
	}

	async fn in_state(&self, scope: &Scope, selector: &str, state: ElementState) -> bool {
		self.run(scope, &js::ELEMENT_STATE, json!({ "selector": selector, "state": state.as_str() }))
			.await
			.is_ok_and(|v| v.as_bool() == Some(true))
	}

	async fn wait_lifecycle(&self, events: &mut broadcast::Receiver<chairside_runtime::CdpEvent>, wait: WaitUntil) -> Result<()> {
		let wanted = match wait {
			WaitUntil::Load => "Page.loadEventFired",
			WaitUntil::DomContentLoaded => "Page.domContentEventFired",
		};
		loop {
			match events.recv().await {
				Ok(event) if event.method == wanted && event.session_id.as_deref() == Some(self.session_id.as_str()) => {
					self.worlds.lock().clear();
					return Ok(());
				}
				Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => return Err(RuntimeError::Closed.into()),
			}
		}
	}
}

fn frame_urls(node: &Value, out: &mut Vec<(String, String)>) {
	let frame = &node["frame"];
	if let Some(id) = frame["id"].as_str() {
		let url = format!("{}{}", frame["url"].as_str().unwrap_or_default(), frame["urlFragment"].as_str().unwrap_or_default());
		out.push((id.to_string(), url));
	}
	if let Some(children) = node["childFrames"].as_array() {
		for child in children {
			frame_urls(child, out);
		}
	}
}

#[async_trait]
impl PortalPage for CdpPage {
	async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
		let mut events = self.conn.subscribe();
		debug!(target = "chairside.cdp", url, ?wait, "navigate");
		let timed_out = || Error::NavigationTimeout {
			url: url.to_string(),
			timeout,
		};

		// The command and the lifecycle event share one budget.
		let deadline = tokio::time::Instant::now() + timeout;

		let reply = match self.call_with_timeout("Page.navigate", json!({ "url": url }), timeout).await {
			Err(Error::Runtime(RuntimeError::Timeout { .. })) => return Err(timed_out()),
			other => other?,
		};
		if let Some(error) = reply["errorText"].as_str().filter(|e| !e.is_empty()) {
			return Err(Error::Driver(format!("navigation to {url} failed: {error}")));
		}
		tokio::time::timeout_at(deadline, self.wait_lifecycle(&mut events, wait))
			.await
			.map_err(|_| timed_out())?
	}

	async fn current_url(&self) -> Result<String> {
		let info = self.conn.call("Target.getTargetInfo", json!({ "targetId": self.target_id })).await?;
		Ok(info["targetInfo"]["url"].as_str().unwrap_or_default().to_string())
	}

	async fn wait_for_navigation(&self, wait: WaitUntil, timeout: Duration) -> Result<()> {
		let mut events = self.conn.subscribe();
		tokio::time::timeout(timeout, self.wait_lifecycle(&mut events, wait))
			.await
			.map_err(|_| Error::NavigationTimeout {
				url: "<pending navigation>".into(),
				timeout,
			})?
	}

	async fn fill(&self, scope: &Scope, selector: &str, value: &str) -> Result<()> {
		self.run(scope, &js::FILL, json!({ "selector": selector, "value": value })).await?;
		Ok(())
	}

	async fn click(&self, scope: &Scope, selector: &str, options: ClickOptions) -> Result<()> {
		let state = if options.force { ElementState::Attached } else { ElementState::Visible };
		self.wait_for(scope, selector, state, options.timeout).await?;
		self.click_element(&ElementHandle {
			scope: scope.clone(),
			selector: selector.to_string(),
			index: 0,
		})
		.await
	}

	async fn click_element(&self, handle: &ElementHandle) -> Result<()> {
		self.run(&handle.scope, &js::CLICK, json!({ "selector": handle.selector, "index": handle.index }))
			.await?;
		Ok(())
	}

	async fn wait_for(&self, scope: &Scope, selector: &str, state: ElementState, timeout: Duration) -> Result<()> {
		let poll = async {
			while !self.in_state(scope, selector, state).await {
				tokio::time::sleep(POLL_INTERVAL).await;
			}
		};
		tokio::time::timeout(timeout, poll).await.map_err(|_| Error::ElementNotFound {
			selector: selector.to_string(),
			state: state.as_str(),
			timeout,
		})
	}

	async fn query_all(&self, scope: &Scope, selector: &str) -> Result<Vec<ElementHandle>> {
		let count = self.run(scope, &js::COUNT, json!({ "selector": selector })).await?.as_u64().unwrap_or(0);
		Ok((0..count as usize)
			.map(|index| ElementHandle {
				scope: scope.clone(),
				selector: selector.to_string(),
				index,
			})
			.collect())
	}

	async fn read_text(&self, handle: &ElementHandle) -> Result<String> {
		let value = self
			.run(&handle.scope, &js::TEXT, json!({ "selector": handle.selector, "index": handle.index }))
			.await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
		let value = self
			.run(
				&handle.scope,
				&js::ATTRIBUTE,
				json!({ "selector": handle.selector, "index": handle.index, "name": name }),
			)
			.await?;
		Ok(value.as_str().map(str::to_string))
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let reply = self.conn.call("Storage.getCookies", json!({ "browserContextId": self.context_id })).await?;
		serde_json::from_value(reply["cookies"].clone()).map_err(|e| Error::Driver(format!("unreadable cookies: {e}")))
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		let params: Vec<Cookie> = cookies
			.iter()
			.cloned()
			.map(|mut cookie| {
				if cookie.is_session() {
					cookie.expires = None;
				}
				cookie
			})
			.collect();
		self.conn
			.call("Storage.setCookies", json!({ "cookies": params, "browserContextId": self.context_id }))
			.await?;
		Ok(())
	}

	async fn evaluate(&self, scope: &Scope, script: &Script, arg: Value) -> Result<Value> {
		self.run(scope, script, arg).await
	}

	async fn frame_of(&self, scope: &Scope, iframe_selector: &str) -> Result<Scope> {
		let selector = Value::String(iframe_selector.to_string());
		let element = self
			.eval_raw(scope, "frame_of", &format!("document.querySelector({selector})"), false)
			.await?;
		let Some(object_id) = element["objectId"].as_str() else {
			return Err(Error::ElementNotFound {
				selector: iframe_selector.to_string(),
				state: ElementState::Attached.as_str(),
				timeout: Duration::ZERO,
			});
		};
		let node = self.call("DOM.describeNode", json!({ "objectId": object_id })).await?;
		node["node"]["frameId"]
			.as_str()
			.map(|id| Scope::Frame(id.to_string()))
			.ok_or_else(|| Error::Driver(format!("{iframe_selector} has no content frame")))
	}

	async fn frame_by_url(&self, fragment: &str) -> Result<Option<Scope>> {
		let tree = self.call("Page.getFrameTree", json!({})).await?;
		let mut frames = Vec::new();
		frame_urls(&tree["frameTree"], &mut frames);
		Ok(frames.into_iter().find(|(_, url)| url.contains(fragment)).map(|(id, _)| Scope::Frame(id)))
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		let reply = self
			.call("Page.captureScreenshot", json!({ "format": "png", "captureBeyondViewport": true }))
			.await?;
		let data = reply["data"].as_str().ok_or_else(|| Error::Driver("screenshot returned no data".into()))?;
		let bytes = STANDARD.decode(data).map_err(|e| Error::Driver(format!("screenshot is not base64: {e}")))?;
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await.map_err(RuntimeError::from)?;
		}
		tokio::fs::write(path, bytes).await.map_err(RuntimeError::from)?;
		Ok(())
	}

	async fn add_init_script(&self, source: &str) -> Result<()> {
		self.call("Page.addScriptToEvaluateOnNewDocument", json!({ "source": source })).await?;
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		self.conn
			.call("Target.disposeBrowserContext", json!({ "browserContextId": self.context_id }))
			.await?;
		debug!(target = "chairside.cdp", context = %self.context_id, "context disposed");
		Ok(())
	}
}
