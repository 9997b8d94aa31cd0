//! Periodic refresh timer and staleness watchdog.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::manager::{RefreshOutcome, SessionLifecycle};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RefreshScheduler {
	lifecycle: Arc<SessionLifecycle>,
	running: Arc<AtomicBool>,
	shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
	join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
	pub fn new(lifecycle: Arc<SessionLifecycle>) -> Self {
		Self {
			lifecycle,
			running: Arc::new(AtomicBool::new(false)),
			shutdown_tx: Mutex::new(None),
			join_handle: Mutex::new(None),
		}
	}

	pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
		&self.lifecycle
	}

	/// Runs the startup refresh to completion, then starts the timer.
	///
	/// Returns the outcome of the startup refresh. Calling `start` on a
	/// running scheduler does nothing and reports `Skipped`. A `stop` that
	/// lands during the startup refresh keeps the timer from starting.
	pub async fn start(&self) -> RefreshOutcome {
		if self.running.swap(true, Ordering::SeqCst) {
			warn!(target = "chairside.session", "refresh scheduler already running");
			return RefreshOutcome::Skipped;
		}

		let settings = self.lifecycle.settings();
		let interval = settings.refresh_interval();
		let watchdog_interval = settings.watchdog_interval();
		let stale_after = settings.stale_after();
		info!(
			target = "chairside.session",
			interval_mins = settings.refresh_interval_mins,
			max_age_mins = settings.max_age_mins,
			"starting refresh scheduler"
		);

		// Installed before the startup refresh so a concurrent stop() is honored.
		let (tx, mut rx) = mpsc::channel(1);
		*self.shutdown_tx.lock() = Some(tx);

		let initial = self.lifecycle.refresh().await;

		if self.shutdown_tx.lock().is_none() {
			info!(target = "chairside.session", "refresh scheduler stopped during startup refresh");
			self.running.store(false, Ordering::SeqCst);
			return initial;
		}

		let lifecycle = Arc::clone(&self.lifecycle);
		let running = Arc::clone(&self.running);
		let handle = tokio::spawn(async move {
			let mut refresh_timer = tokio::time::interval_at(Instant::now() + interval, interval);
			refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
			let mut watchdog = tokio::time::interval_at(Instant::now() + watchdog_interval, watchdog_interval);
			watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = rx.recv() => {
						info!(target = "chairside.session", "refresh scheduler received shutdown signal");
						break;
					}
					_ = refresh_timer.tick() => {
						// Detached so stopping the timer never cuts a refresh short.
						let lifecycle = Arc::clone(&lifecycle);
						tokio::spawn(async move {
							lifecycle.refresh().await;
						});
					}
					_ = watchdog.tick() => check_staleness(&lifecycle, stale_after),
				}
			}
			running.store(false, Ordering::SeqCst);
		});
		*self.join_handle.lock() = Some(handle);

		initial
	}

	/// Cancels future firings. An in-flight refresh keeps running.
	pub async fn stop(&self) {
		let tx = self.shutdown_tx.lock().take();
		let Some(tx) = tx else {
			return;
		};
		info!(target = "chairside.session", "stopping refresh scheduler");
		let _ = tx.send(()).await;

		let handle = self.join_handle.lock().take();
		if let Some(handle) = handle {
			match tokio::time::timeout(STOP_TIMEOUT, handle).await {
				Ok(Ok(())) => info!(target = "chairside.session", "refresh scheduler stopped"),
				Ok(Err(err)) => error!(target = "chairside.session", error = %err, "refresh scheduler task panicked"),
				Err(_) => error!(target = "chairside.session", "refresh scheduler did not stop in time"),
			}
		}
		self.running.store(false, Ordering::SeqCst);
	}

	pub fn is_active(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}
}

fn check_staleness(lifecycle: &SessionLifecycle, stale_after: Duration) {
	match lifecycle.since_last_refresh() {
		Some(since) if since > stale_after => error!(
			target = "chairside.session",
			minutes_since_refresh = since.as_secs() / 60,
			"session has not been refreshed recently; check the refresh scheduler"
		),
		Some(_) => {}
		None => warn!(target = "chairside.session", "no successful session refresh yet"),
	}
}
