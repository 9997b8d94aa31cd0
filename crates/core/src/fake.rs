//! Scripted in-memory portal for exercising the engine without a browser.
//!
//! A [`FakePage`] holds a flat list of elements keyed by scope and selector
//! string. Tests describe the portal by registering [`Effect`]s that run when
//! a URL is loaded or a selector is clicked, and by scripting the JSON each
//! page function returns. Elements can be given an appearance delay, so DOM
//! races resolve deterministically under a paused tokio clock.
//!
//! # Example
//!
//! ```ignore
//! let browser = FakeBrowser::new(|page| {
//!     page.on_navigate("https://portal/login", vec![Effect::Insert(FakeElement::new(Scope::Main, "#user"))]);
//!     page.on_click(Scope::Main, "#go", vec![Effect::Navigate("https://portal/home".into())]);
//! });
//! let page = browser.new_context().await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chairside_protocol::Cookie;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::driver::{Browser, ClickOptions, ElementHandle, ElementState, FrameId, PortalPage, Scope, Script, WaitUntil};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An element that exists (or will exist) in one scope of the page.
#[derive(Debug, Clone)]
pub struct FakeElement {
	scope: Scope,
	selector: String,
	text: String,
	attrs: BTreeMap<String, String>,
	visible: bool,
	delay: Duration,
	frame: Option<(FrameId, String)>,
	ready_at: Option<Instant>,
}

impl FakeElement {
	pub fn new(scope: Scope, selector: impl Into<String>) -> Self {
		Self {
			scope,
			selector: selector.into(),
			text: String::new(),
			attrs: BTreeMap::new(),
			visible: true,
			delay: Duration::ZERO,
			frame: None,
			ready_at: None,
		}
	}

	pub fn text(mut self, text: impl Into<String>) -> Self {
		self.text = text.into();
		self
	}

	pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attrs.insert(name.into(), value.into());
		self
	}

	/// Attached but not visible.
	pub fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}

	/// Appears `delay` after it is inserted.
	pub fn after(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Makes this an iframe whose document is `Scope::Frame(id)` at `url`.
	pub fn frame(mut self, id: impl Into<FrameId>, url: impl Into<String>) -> Self {
		self.frame = Some((id.into(), url.into()));
		self
	}

	fn is_present(&self, now: Instant) -> bool {
		self.ready_at.is_some_and(|at| at <= now)
	}

	fn matches(&self, scope: &Scope, selector: &str) -> bool {
		&self.scope == scope && selector.split(',').any(|part| part.trim() == self.selector)
	}
}

/// A change to the page, run when its trigger fires.
#[derive(Debug, Clone)]
pub enum Effect {
	Insert(FakeElement),
	Remove { scope: Scope, selector: String },
	/// Replaces the document: clears every element and runs the URL's load effects.
	Navigate(String),
	/// Changes the URL without loading a document.
	SetUrl(String),
	AddCookies(Vec<Cookie>),
	/// Branches on whether the context holds a cookie named `name`.
	WhenCookie { name: String, present: Vec<Effect>, absent: Vec<Effect> },
	After(Duration, Vec<Effect>),
}

/// Everything the engine did to a page, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	Navigate(String),
	Fill { scope: Scope, selector: String, value: String },
	Click { scope: Scope, selector: String, force: bool },
	ClickElement { selector: String, index: usize, text: String },
	SetCookies(Vec<String>),
	Evaluate { scope: Scope, script: String },
	Screenshot(PathBuf),
	InitScript,
	Close,
}

#[derive(Debug, Default)]
struct PageState {
	url: String,
	elements: Vec<FakeElement>,
	cookies: Vec<Cookie>,
	evaluations: HashMap<(Scope, String), Value>,
	navigate_effects: Vec<(String, Vec<Effect>)>,
	click_effects: Vec<(Scope, String, Vec<Effect>)>,
	failing_navigations: Vec<String>,
	navigation_latency: Duration,
	fail_screenshots: bool,
	actions: Vec<Action>,
	closed: bool,
}

impl PageState {
	fn insert(&mut self, mut element: FakeElement) {
		element.ready_at = Some(Instant::now() + element.delay);
		self.elements.push(element);
	}

	fn present(&self, scope: &Scope, selector: &str, now: Instant) -> Vec<&FakeElement> {
		self.elements.iter().filter(|e| e.matches(scope, selector) && e.is_present(now)).collect()
	}

	fn nth(&self, handle: &ElementHandle) -> Result<&FakeElement> {
		self.present(&handle.scope, &handle.selector, Instant::now())
			.into_iter()
			.nth(handle.index)
			.ok_or_else(|| missing(&handle.selector, ElementState::Attached, Duration::ZERO))
	}

	/// Whether `state` holds now, and when the next pending match appears.
	fn check(&self, scope: &Scope, selector: &str, state: ElementState, now: Instant) -> (bool, Option<Instant>) {
		let present = self.present(scope, selector, now);
		let satisfied = match state {
			ElementState::Attached => !present.is_empty(),
			ElementState::Visible => present.iter().any(|e| e.visible),
			ElementState::Hidden => !present.iter().any(|e| e.visible),
		};
		let next = self
			.elements
			.iter()
			.filter(|e| e.matches(scope, selector))
			.filter_map(|e| e.ready_at)
			.filter(|at| *at > now)
			.min();
		(satisfied, next)
	}

	fn merge_cookies(&mut self, cookies: &[Cookie]) {
		for cookie in cookies {
			self.cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
			self.cookies.push(cookie.clone());
		}
	}
}

fn missing(selector: &str, state: ElementState, timeout: Duration) -> Error {
	Error::ElementNotFound {
		selector: selector.to_string(),
		state: state.as_str(),
		timeout,
	}
}

/// One scripted page and its context. Clones share state.
#[derive(Clone)]
pub struct FakePage {
	state: Arc<Mutex<PageState>>,
	navigations: Arc<watch::Sender<u64>>,
}

impl Default for FakePage {
	fn default() -> Self {
		Self::new()
	}
}

impl FakePage {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(0);
		Self {
			state: Arc::new(Mutex::new(PageState {
				url: "about:blank".into(),
				..PageState::default()
			})),
			navigations: Arc::new(tx),
		}
	}

	/// Runs `effects` whenever a URL starting with `url_prefix` loads.
	pub fn on_navigate(&self, url_prefix: impl Into<String>, effects: Vec<Effect>) {
		self.state.lock().navigate_effects.push((url_prefix.into(), effects));
	}

	/// Runs `effects` whenever exactly `selector` in `scope` is clicked.
	pub fn on_click(&self, scope: Scope, selector: impl Into<String>, effects: Vec<Effect>) {
		self.state.lock().click_effects.push((scope, selector.into(), effects));
	}

	/// Value returned when the page function named `script` is evaluated in `scope`.
	pub fn respond(&self, scope: Scope, script: &str, value: Value) {
		self.state.lock().evaluations.insert((scope, script.to_string()), value);
	}

	pub fn insert(&self, element: FakeElement) {
		self.state.lock().insert(element);
	}

	pub fn set_navigation_latency(&self, latency: Duration) {
		self.state.lock().navigation_latency = latency;
	}

	/// Navigations to URLs starting with `url_prefix` time out.
	pub fn fail_navigation(&self, url_prefix: impl Into<String>) {
		self.state.lock().failing_navigations.push(url_prefix.into());
	}

	pub fn fail_screenshots(&self) {
		self.state.lock().fail_screenshots = true;
	}

	pub fn actions(&self) -> Vec<Action> {
		self.state.lock().actions.clone()
	}

	pub fn url(&self) -> String {
		self.state.lock().url.clone()
	}

	pub fn cookie_jar(&self) -> Vec<Cookie> {
		self.state.lock().cookies.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Whether a matching element is present right now.
	pub fn has(&self, scope: &Scope, selector: &str) -> bool {
		!self.state.lock().present(scope, selector, Instant::now()).is_empty()
	}

	fn record(&self, action: Action) {
		self.state.lock().actions.push(action);
	}

	fn load(&self, url: &str) {
		let effects: Vec<Effect> = {
			let mut state = self.state.lock();
			state.url = url.to_string();
			state.elements.clear();
			state
				.navigate_effects
				.iter()
				.filter(|(prefix, _)| url.starts_with(prefix.as_str()))
				.flat_map(|(_, effects)| effects.iter().cloned())
				.collect()
		};
		self.apply(effects);
		self.navigations.send_modify(|n| *n += 1);
	}

	fn apply(&self, effects: Vec<Effect>) {
		for effect in effects {
			match effect {
				Effect::Insert(element) => self.state.lock().insert(element),
				Effect::Remove { scope, selector } => self.state.lock().elements.retain(|e| !(e.scope == scope && e.selector == selector)),
				Effect::Navigate(url) => self.load(&url),
				Effect::SetUrl(url) => self.state.lock().url = url,
				Effect::AddCookies(cookies) => self.state.lock().merge_cookies(&cookies),
				Effect::WhenCookie { name, present, absent } => {
					let has = self.state.lock().cookies.iter().any(|c| c.name == name);
					self.apply(if has { present } else { absent });
				}
				Effect::After(delay, effects) => {
					let page = self.clone();
					tokio::spawn(async move {
						tokio::time::sleep(delay).await;
						page.apply(effects);
					});
				}
			}
		}
	}

	fn click_effects(&self, scope: &Scope, selector: &str) -> Vec<Effect> {
		self.state
			.lock()
			.click_effects
			.iter()
			.filter(|(s, sel, _)| s == scope && sel == selector)
			.flat_map(|(_, _, effects)| effects.iter().cloned())
			.collect()
	}
}

#[async_trait]
impl PortalPage for FakePage {
	async fn navigate(&self, url: &str, _wait: WaitUntil, timeout: Duration) -> Result<()> {
		self.record(Action::Navigate(url.to_string()));
		let (latency, failing) = {
			let state = self.state.lock();
			let failing = state.failing_navigations.iter().any(|prefix| url.starts_with(prefix.as_str()));
			(state.navigation_latency, failing)
		};
		if failing || latency > timeout {
			tokio::time::sleep(timeout).await;
			return Err(Error::NavigationTimeout {
				url: url.to_string(),
				timeout,
			});
		}
		tokio::time::sleep(latency).await;
		self.load(url);
		Ok(())
	}

	async fn current_url(&self) -> Result<String> {
		Ok(self.url())
	}

	async fn wait_for_navigation(&self, _wait: WaitUntil, timeout: Duration) -> Result<()> {
		let mut rx = self.navigations.subscribe();
		match tokio::time::timeout(timeout, rx.changed()).await {
			Ok(Ok(())) => Ok(()),
			_ => Err(Error::NavigationTimeout { url: self.url(), timeout }),
		}
	}

	async fn fill(&self, scope: &Scope, selector: &str, value: &str) -> Result<()> {
		{
			let mut state = self.state.lock();
			let now = Instant::now();
			let element = state
				.elements
				.iter_mut()
				.find(|e| e.matches(scope, selector) && e.is_present(now))
				.ok_or_else(|| missing(selector, ElementState::Attached, Duration::ZERO))?;
			element.attrs.insert("value".into(), value.to_string());
		}
		self.record(Action::Fill {
			scope: scope.clone(),
			selector: selector.to_string(),
			value: value.to_string(),
		});
		Ok(())
	}

	async fn click(&self, scope: &Scope, selector: &str, options: ClickOptions) -> Result<()> {
		let state = if options.force { ElementState::Attached } else { ElementState::Visible };
		self.wait_for(scope, selector, state, options.timeout).await?;
		self.record(Action::Click {
			scope: scope.clone(),
			selector: selector.to_string(),
			force: options.force,
		});
		self.apply(self.click_effects(scope, selector));
		Ok(())
	}

	async fn click_element(&self, handle: &ElementHandle) -> Result<()> {
		let text = self.state.lock().nth(handle)?.text.clone();
		self.record(Action::ClickElement {
			selector: handle.selector.clone(),
			index: handle.index,
			text,
		});
		self.apply(self.click_effects(&handle.scope, &handle.selector));
		Ok(())
	}

	async fn wait_for(&self, scope: &Scope, selector: &str, state: ElementState, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			let now = Instant::now();
			let (satisfied, next) = self.state.lock().check(scope, selector, state, now);
			if satisfied {
				return Ok(());
			}
			if now >= deadline {
				return Err(missing(selector, state, timeout));
			}
			let mut wake = (now + POLL_INTERVAL).min(deadline);
			if let Some(at) = next {
				wake = wake.min(at);
			}
			tokio::time::sleep_until(wake).await;
		}
	}

	async fn query_all(&self, scope: &Scope, selector: &str) -> Result<Vec<ElementHandle>> {
		let count = self.state.lock().present(scope, selector, Instant::now()).len();
		Ok((0..count)
			.map(|index| ElementHandle {
				scope: scope.clone(),
				selector: selector.to_string(),
				index,
			})
			.collect())
	}

	async fn read_text(&self, handle: &ElementHandle) -> Result<String> {
		Ok(self.state.lock().nth(handle)?.text.clone())
	}

	async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
		Ok(self.state.lock().nth(handle)?.attrs.get(name).cloned())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		Ok(self.cookie_jar())
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		self.state.lock().merge_cookies(cookies);
		self.record(Action::SetCookies(cookies.iter().map(|c| c.name.clone()).collect()));
		Ok(())
	}

	async fn evaluate(&self, scope: &Scope, script: &Script, _arg: Value) -> Result<Value> {
		self.record(Action::Evaluate {
			scope: scope.clone(),
			script: script.name.to_string(),
		});
		self.state
			.lock()
			.evaluations
			.get(&(scope.clone(), script.name.to_string()))
			.cloned()
			.ok_or_else(|| Error::Script {
				name: script.name.to_string(),
				message: format!("no scripted result in {scope}"),
			})
	}

	async fn frame_of(&self, scope: &Scope, iframe_selector: &str) -> Result<Scope> {
		let state = self.state.lock();
		state
			.present(scope, iframe_selector, Instant::now())
			.into_iter()
			.find_map(|e| e.frame.as_ref())
			.map(|(id, _)| Scope::Frame(id.clone()))
			.ok_or_else(|| missing(iframe_selector, ElementState::Attached, Duration::ZERO))
	}

	async fn frame_by_url(&self, fragment: &str) -> Result<Option<Scope>> {
		let state = self.state.lock();
		let now = Instant::now();
		Ok(state
			.elements
			.iter()
			.filter(|e| e.is_present(now))
			.filter_map(|e| e.frame.as_ref())
			.find(|(_, url)| url.contains(fragment))
			.map(|(id, _)| Scope::Frame(id.clone())))
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		self.record(Action::Screenshot(path.to_path_buf()));
		if self.state.lock().fail_screenshots {
			return Err(Error::Driver("screenshot capture failed".into()));
		}
		Ok(())
	}

	async fn add_init_script(&self, _source: &str) -> Result<()> {
		self.record(Action::InitScript);
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		let mut state = self.state.lock();
		if !state.closed {
			state.closed = true;
			state.actions.push(Action::Close);
		}
		Ok(())
	}
}

type Setup = dyn Fn(&FakePage) + Send + Sync;

/// Hands out a freshly scripted [`FakePage`] per context.
pub struct FakeBrowser {
	setup: Box<Setup>,
	pages: Mutex<Vec<FakePage>>,
}

impl FakeBrowser {
	/// `setup` scripts every new page before the engine sees it.
	pub fn new(setup: impl Fn(&FakePage) + Send + Sync + 'static) -> Self {
		Self {
			setup: Box::new(setup),
			pages: Mutex::new(Vec::new()),
		}
	}

	/// Every page handed out so far, oldest first.
	pub fn pages(&self) -> Vec<FakePage> {
		self.pages.lock().clone()
	}

	pub fn contexts_opened(&self) -> usize {
		self.pages.lock().len()
	}

	pub fn contexts_closed(&self) -> usize {
		self.pages.lock().iter().filter(|p| p.is_closed()).count()
	}
}

#[async_trait]
impl Browser for FakeBrowser {
	async fn new_context(&self) -> Result<Box<dyn PortalPage>> {
		let page = FakePage::new();
		(self.setup)(&page);
		self.pages.lock().push(page.clone());
		Ok(Box::new(page))
	}
}
