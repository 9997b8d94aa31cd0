//! Session lifecycle: refresh, validation and at-most-one concurrent refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chairside_protocol::{RefreshStatus, SessionPhase};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::login;
use super::state::SessionState;
use super::store::SessionStore;
use crate::clock::Clock;
use crate::config::{PortalConfig, SessionSettings};
use crate::driver::{Browser, PortalPage};
use crate::error::Result;

/// What a refresh request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	Completed { sequence: u64, logged_in: bool },
	/// Another refresh was already running; this request was dropped.
	Skipped,
	Failed { reason: String },
}

#[derive(Debug, Default)]
struct Inner {
	phase: Option<SessionPhase>,
	current: Option<SessionState>,
	last_refresh_at: Option<DateTime<Utc>>,
	refresh_count: u64,
	sequence: u64,
}

/// Releases the refreshing flag when dropped, including on unwind.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
	}
}

impl Drop for RefreshGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// Owns the authentication snapshot and every write to the store.
pub struct SessionLifecycle {
	browser: Arc<dyn Browser>,
	store: SessionStore,
	portal: PortalConfig,
	settings: SessionSettings,
	clock: Arc<dyn Clock>,
	refreshing: AtomicBool,
	inner: Mutex<Inner>,
}

impl SessionLifecycle {
	/// Validates `settings` and seeds the sequence counter from the stored snapshot.
	pub fn new(browser: Arc<dyn Browser>, store: SessionStore, portal: PortalConfig, settings: SessionSettings, clock: Arc<dyn Clock>) -> Result<Self> {
		settings.validate()?;

		let stored = match store.load() {
			Ok(stored) => stored,
			Err(err) => {
				warn!(target = "chairside.session", error = %err, "ignoring unreadable session snapshot");
				None
			}
		};
		let inner = Inner {
			sequence: stored.as_ref().map_or(0, |s| s.sequence),
			current: stored,
			..Inner::default()
		};

		Ok(Self {
			browser,
			store,
			portal,
			settings,
			clock,
			refreshing: AtomicBool::new(false),
			inner: Mutex::new(inner),
		})
	}

	pub fn settings(&self) -> &SessionSettings {
		&self.settings
	}

	pub fn portal(&self) -> &PortalConfig {
		&self.portal
	}

	pub fn store(&self) -> &SessionStore {
		&self.store
	}

	pub fn is_refreshing(&self) -> bool {
		self.refreshing.load(Ordering::Acquire)
	}

	pub fn phase(&self) -> SessionPhase {
		if self.is_refreshing() {
			return SessionPhase::Refreshing;
		}
		let now = self.clock.now();
		let inner = self.inner.lock();
		match inner.phase {
			Some(SessionPhase::Fresh) if inner.current.as_ref().is_some_and(|s| s.is_fresh(now, self.settings.max_age())) => SessionPhase::Fresh,
			_ => SessionPhase::Idle,
		}
	}

	pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
		self.inner.lock().last_refresh_at
	}

	/// Validates or regenerates the snapshot.
	///
	/// Concurrent calls while a refresh runs return [`RefreshOutcome::Skipped`]
	/// immediately. Failures are logged and leave the previous snapshot in place.
	pub async fn refresh(&self) -> RefreshOutcome {
		let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
			info!(target = "chairside.session", "refresh already in progress, skipping");
			return RefreshOutcome::Skipped;
		};

		let sequence = {
			let mut inner = self.inner.lock();
			inner.phase = Some(SessionPhase::Refreshing);
			inner.sequence + 1
		};
		info!(target = "chairside.session", sequence, "starting session refresh");
		let started = Instant::now();

		match self.run_refresh(sequence).await {
			Ok((state, logged_in)) => {
				let mut inner = self.inner.lock();
				inner.phase = Some(SessionPhase::Fresh);
				inner.sequence = sequence;
				inner.last_refresh_at = Some(state.captured_at);
				inner.refresh_count += 1;
				inner.current = Some(state);
				info!(
					target = "chairside.session",
					sequence,
					logged_in,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"session refresh completed"
				);
				RefreshOutcome::Completed { sequence, logged_in }
			}
			Err(err) => {
				self.inner.lock().phase = Some(SessionPhase::Idle);
				error!(target = "chairside.session", sequence, error = %err, "session refresh failed");
				RefreshOutcome::Failed { reason: err.to_string() }
			}
		}
	}

	/// [`refresh`](Self::refresh) triggered by an operator.
	pub async fn force_refresh(&self) -> RefreshOutcome {
		info!(target = "chairside.session", "manual refresh requested");
		self.refresh().await
	}

	async fn run_refresh(&self, sequence: u64) -> Result<(SessionState, bool)> {
		let page = self.browser.new_context().await?;
		let result = self.refresh_in(page.as_ref(), sequence).await;
		if let Err(err) = page.close().await {
			warn!(target = "chairside.session", error = %err, "failed to close refresh context");
		}
		result
	}

	async fn refresh_in(&self, page: &dyn PortalPage, sequence: u64) -> Result<(SessionState, bool)> {
		if let Some(snapshot) = self.stored_fresh_snapshot() {
			page.set_cookies(&snapshot.cookies).await?;
			debug!(target = "chairside.session", cookies = snapshot.cookies.len(), "injected stored cookies");
		}

		let logged_in = if login::needs_login(page, &self.portal).await {
			info!(target = "chairside.session", "not authenticated, logging in");
			let credentials = self.portal.credentials()?;
			login::login(page, &self.portal, &credentials).await?;
			true
		} else {
			info!(target = "chairside.session", "stored session still accepted");
			false
		};

		let state = SessionState::new(page.cookies().await?, self.clock.now(), sequence);
		self.store.save(&state)?;
		Ok((state, logged_in))
	}

	fn stored_fresh_snapshot(&self) -> Option<SessionState> {
		match self.store.load() {
			Ok(Some(state)) if state.is_fresh(self.clock.now(), self.settings.max_age()) => Some(state),
			Ok(Some(_)) => {
				debug!(target = "chairside.session", "stored snapshot expired");
				None
			}
			Ok(None) => None,
			Err(err) => {
				warn!(target = "chairside.session", error = %err, "stored snapshot unusable");
				None
			}
		}
	}

	/// The in-memory snapshot if fresh, else the stored one if fresh.
	pub fn valid_session(&self) -> Option<SessionState> {
		let now = self.clock.now();
		let max_age = self.settings.max_age();
		{
			let inner = self.inner.lock();
			if let Some(state) = inner.current.as_ref().filter(|s| s.is_fresh(now, max_age)) {
				return Some(state.clone());
			}
		}
		self.stored_fresh_snapshot()
	}

	/// Time since the last successful refresh in this process.
	pub fn since_last_refresh(&self) -> Option<Duration> {
		let last = self.inner.lock().last_refresh_at?;
		(self.clock.now() - last).to_std().ok()
	}

	pub fn status(&self, scheduler_active: bool) -> RefreshStatus {
		let phase = self.phase();
		let since = self.since_last_refresh();
		let inner = self.inner.lock();
		let interval = self.settings.refresh_interval();
		RefreshStatus {
			active: scheduler_active,
			refreshing: phase == SessionPhase::Refreshing,
			phase,
			last_refresh_at: inner.last_refresh_at,
			refresh_count: inner.refresh_count,
			sequence_number: inner.current.as_ref().map(|s| s.sequence),
			last_refresh_ago_ms: since.map(|d| d.as_millis() as u64),
			next_refresh_in_ms: since.filter(|_| scheduler_active).map(|d| interval.saturating_sub(d).as_millis() as u64),
		}
	}
}
