//! The assembled service: browser, session lifecycle, scheduler and lookup engine.

use std::sync::Arc;
use std::time::Instant;

use chairside::cdp::SharedBrowser;
use chairside::{Browser, Clock, LookupEngine, LookupReport, RefreshScheduler, SessionLifecycle, SessionStore, SystemClock};
use chairside_protocol::{LookupOutcome, LookupQuery, RefreshStatus};
use tracing::info;

use crate::branches::BranchTable;
use crate::config::AppConfig;
use crate::error::Result;

pub struct AppContext {
	lifecycle: Arc<SessionLifecycle>,
	scheduler: RefreshScheduler,
	engine: LookupEngine,
	branches: BranchTable,
	started: Instant,
}

impl AppContext {
	pub fn new(config: AppConfig, browser: Arc<dyn Browser>, clock: Arc<dyn Clock>) -> Result<Self> {
		let store = SessionStore::new(config.session.snapshot_path.clone());
		let lifecycle = Arc::new(SessionLifecycle::new(Arc::clone(&browser), store, config.portal, config.session, clock)?);
		let engine = LookupEngine::new(browser, Arc::clone(&lifecycle), config.lookup);
		Ok(Self {
			scheduler: RefreshScheduler::new(Arc::clone(&lifecycle)),
			lifecycle,
			engine,
			branches: config.branches,
			started: Instant::now(),
		})
	}

	/// Context backed by a lazily launched Chromium.
	pub fn with_cdp(config: AppConfig) -> Result<Self> {
		let browser = Arc::new(SharedBrowser::new(config.browser.clone()));
		Self::new(config, browser, Arc::new(SystemClock))
	}

	pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
		&self.lifecycle
	}

	pub fn scheduler(&self) -> &RefreshScheduler {
		&self.scheduler
	}

	pub fn branches(&self) -> &BranchTable {
		&self.branches
	}

	pub fn uptime_secs(&self) -> u64 {
		self.started.elapsed().as_secs()
	}

	pub fn refresh_status(&self) -> RefreshStatus {
		self.lifecycle.status(self.scheduler.is_active())
	}

	/// Normalizes the office name, then runs the lookup.
	pub async fn lookup(&self, query: LookupQuery) -> LookupOutcome {
		self.lookup_report(query).await.outcome
	}

	/// [`lookup`](Self::lookup) keeping the error screenshot path.
	pub async fn lookup_report(&self, mut query: LookupQuery) -> LookupReport {
		let office = self.branches.normalize(&query.branch);
		if office != query.branch {
			info!(target = "chairside.http", from = %query.branch, to = %office, "branch mapped");
		}
		query.branch = office;
		self.engine.lookup_report(&query).await
	}
}
