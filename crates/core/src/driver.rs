//! Browser-automation capability consumed by the session and lookup flows.
//!
//! The engine never talks to a browser directly. It asks a [`Browser`] for an
//! isolated context and drives the single [`PortalPage`] inside it. Every DOM
//! operation names the document it runs in with a [`Scope`], so work inside
//! the portal's iframes reads the same as work on the top-level page.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chairside_protocol::Cookie;
use serde_json::Value;

use crate::error::Result;

pub type FrameId = String;

/// Document an operation runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	Main,
	Frame(FrameId),
}

impl std::fmt::Display for Scope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Scope::Main => f.write_str("main"),
			Scope::Frame(id) => write!(f, "frame:{id}"),
		}
	}
}

/// Lifecycle point a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
	Load,
	DomContentLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
	Attached,
	Visible,
	Hidden,
}

impl ElementState {
	pub fn as_str(self) -> &'static str {
		match self {
			ElementState::Attached => "attached",
			ElementState::Visible => "visible",
			ElementState::Hidden => "hidden",
		}
	}
}

pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
	/// Skip the visibility check and click as soon as the element is attached.
	pub force: bool,
	pub timeout: Duration,
}

impl Default for ClickOptions {
	fn default() -> Self {
		Self {
			force: false,
			timeout: DEFAULT_ACTION_TIMEOUT,
		}
	}
}

impl ClickOptions {
	pub fn forced(timeout: Duration) -> Self {
		Self { force: true, timeout }
	}
}

/// The `index`-th match of `selector` in `scope` at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
	pub scope: Scope,
	pub selector: String,
	pub index: usize,
}

/// A named page function, called with one JSON argument.
#[derive(Debug, Clone, Copy)]
pub struct Script {
	pub name: &'static str,
	pub source: &'static str,
}

#[async_trait]
pub trait Browser: Send + Sync {
	/// Opens an isolated context (own cookie jar) holding one blank page.
	async fn new_context(&self) -> Result<Box<dyn PortalPage>>;
}

#[async_trait]
pub trait PortalPage: Send + Sync {
	async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()>;

	async fn current_url(&self) -> Result<String>;

	/// Resolves at the next top-level lifecycle event of kind `wait`.
	async fn wait_for_navigation(&self, wait: WaitUntil, timeout: Duration) -> Result<()>;

	async fn fill(&self, scope: &Scope, selector: &str, value: &str) -> Result<()>;

	async fn click(&self, scope: &Scope, selector: &str, options: ClickOptions) -> Result<()>;

	async fn click_element(&self, handle: &ElementHandle) -> Result<()>;

	async fn wait_for(&self, scope: &Scope, selector: &str, state: ElementState, timeout: Duration) -> Result<()>;

	async fn query_all(&self, scope: &Scope, selector: &str) -> Result<Vec<ElementHandle>>;

	async fn read_text(&self, handle: &ElementHandle) -> Result<String>;

	async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>>;

	async fn cookies(&self) -> Result<Vec<Cookie>>;

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

	async fn evaluate(&self, scope: &Scope, script: &Script, arg: Value) -> Result<Value>;

	/// Content frame of the iframe element matching `iframe_selector` in `scope`.
	async fn frame_of(&self, scope: &Scope, iframe_selector: &str) -> Result<Scope>;

	/// First frame whose URL contains `fragment`.
	async fn frame_by_url(&self, fragment: &str) -> Result<Option<Scope>>;

	async fn screenshot(&self, path: &Path) -> Result<()>;

	/// Registers a script that runs before any page script on every new document.
	async fn add_init_script(&self, source: &str) -> Result<()>;

	/// Closes the page and disposes its context. Safe to call more than once.
	async fn close(&self) -> Result<()>;
}
