mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chairside::fake::{Action, Effect, FakeBrowser};
use chairside::session::login::{PASSWORD_INPUT, PASSWORD_SUBMIT, USERNAME_INPUT, USERNAME_SUBMIT};
use chairside::{RefreshOutcome, RefreshScheduler, Scope, SessionLifecycle, SessionState, SessionStore};
use chairside_protocol::{Cookie, SessionPhase};
use common::{SESSION_COOKIE, main_el};
use futures_util::future::join_all;
use tokio::time::Instant;

const LATENCY: Duration = Duration::from_millis(500);

struct Harness {
	_dir: tempfile::TempDir,
	browser: Arc<FakeBrowser>,
	clock: Arc<chairside::ManualClock>,
	store: SessionStore,
	lifecycle: Arc<SessionLifecycle>,
}

fn harness(setup: impl Fn(&chairside::fake::FakePage) + Send + Sync + 'static) -> Harness {
	let dir = tempfile::tempdir().unwrap();
	harness_in(dir, setup)
}

fn harness_in(dir: tempfile::TempDir, setup: impl Fn(&chairside::fake::FakePage) + Send + Sync + 'static) -> Harness {
	let settings = common::settings(&dir);
	let store = SessionStore::new(settings.snapshot_path.clone());
	let browser = Arc::new(FakeBrowser::new(setup));
	let clock = common::clock();
	let lifecycle = SessionLifecycle::new(browser.clone(), store.clone(), common::portal(), settings, clock.clone()).unwrap();
	Harness {
		_dir: dir,
		browser,
		clock,
		store,
		lifecycle: Arc::new(lifecycle),
	}
}

fn portal_with_latency(page: &chairside::fake::FakePage) {
	common::script_portal(page);
	page.set_navigation_latency(LATENCY);
}

#[tokio::test(start_paused = true)]
async fn first_refresh_logs_in_and_persists_sequence_one() {
	let h = harness(common::script_portal);
	assert!(h.store.load().unwrap().is_none());

	let outcome = h.lifecycle.refresh().await;
	assert_eq!(outcome, RefreshOutcome::Completed { sequence: 1, logged_in: true });

	let stored = h.store.load().unwrap().expect("snapshot written");
	assert_eq!(stored.sequence, 1);
	assert!(stored.cookies.iter().any(|c| c.name == SESSION_COOKIE));
	assert_eq!(h.lifecycle.phase(), SessionPhase::Fresh);
	assert_eq!(h.browser.contexts_opened(), 1);
	assert_eq!(h.browser.contexts_closed(), 1);

	let actions = h.browser.pages()[0].actions();
	let password_fill = actions
		.iter()
		.find_map(|a| match a {
			Action::Fill { selector, value, .. } if selector == PASSWORD_INPUT => Some(value.clone()),
			_ => None,
		})
		.unwrap();
	assert_eq!(password_fill, "not-a-real-password");
}

#[tokio::test(start_paused = true)]
async fn fresh_snapshot_is_reused_without_login() {
	let h = harness(common::script_portal);
	h.lifecycle.refresh().await;
	h.clock.advance(Duration::from_secs(30 * 60));

	let outcome = h.lifecycle.refresh().await;
	assert_eq!(outcome, RefreshOutcome::Completed { sequence: 2, logged_in: false });

	let second = &h.browser.pages()[1];
	let actions = second.actions();
	assert_eq!(actions[0], Action::SetCookies(vec![SESSION_COOKIE.to_string()]));
	assert!(!actions.iter().any(|a| matches!(a, Action::Navigate(url) if url.contains("/login"))));
	assert_eq!(h.store.load().unwrap().unwrap().sequence, 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_run_once() {
	let h = harness(portal_with_latency);

	let outcomes = join_all((0..5).map(|_| h.lifecycle.refresh())).await;

	let completed = outcomes.iter().filter(|o| matches!(o, RefreshOutcome::Completed { .. })).count();
	let skipped = outcomes.iter().filter(|o| **o == RefreshOutcome::Skipped).count();
	assert_eq!((completed, skipped), (1, 4));
	assert_eq!(h.browser.contexts_opened(), 1);
	assert_eq!(h.store.load().unwrap().unwrap().sequence, 1);
	assert!(!h.lifecycle.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_snapshot() {
	let broken = Arc::new(AtomicBool::new(false));
	let h = harness({
		let broken = Arc::clone(&broken);
		move |page| {
			common::script_portal(page);
			if broken.load(Ordering::SeqCst) {
				page.fail_navigation("https://");
			}
		}
	});

	assert!(matches!(h.lifecycle.refresh().await, RefreshOutcome::Completed { sequence: 1, .. }));
	let before = h.store.load().unwrap().unwrap();

	broken.store(true, Ordering::SeqCst);
	h.clock.advance(Duration::from_secs(116 * 60));
	let outcome = h.lifecycle.refresh().await;
	assert!(matches!(outcome, RefreshOutcome::Failed { ref reason } if reason.contains("did not complete")));

	assert_eq!(h.store.load().unwrap().unwrap(), before);
	assert_eq!(h.lifecycle.phase(), SessionPhase::Idle);
	assert!(!h.lifecycle.is_refreshing());
	assert_eq!(h.browser.contexts_closed(), 2);

	broken.store(false, Ordering::SeqCst);
	assert!(matches!(h.lifecycle.refresh().await, RefreshOutcome::Completed { sequence: 2, logged_in: true }));
}

#[tokio::test(start_paused = true)]
async fn login_that_never_leaves_login_page_fails() {
	let h = harness(|page| {
		let portal = common::portal();
		page.on_navigate(portal.protected_url.clone(), vec![Effect::Insert(main_el("#redirectLogin"))]);
		page.on_navigate(portal.login_url.clone(), vec![
			Effect::Insert(main_el(USERNAME_INPUT)),
			Effect::Insert(main_el(USERNAME_SUBMIT)),
		]);
		page.on_click(Scope::Main, USERNAME_SUBMIT, vec![
			Effect::Insert(main_el(PASSWORD_INPUT)),
			Effect::Insert(main_el(PASSWORD_SUBMIT)),
		]);
	});

	let started = Instant::now();
	let outcome = h.lifecycle.refresh().await;
	assert!(matches!(outcome, RefreshOutcome::Failed { ref reason } if reason.starts_with("login failed")));
	assert!(started.elapsed() >= Duration::from_secs(30));
	assert!(h.store.load().unwrap().is_none());
}

/// Login form whose password input is rendered but never shown.
fn portal_with_hidden_password(page: &chairside::fake::FakePage) {
	let portal = common::portal();
	page.on_navigate(portal.login_url.clone(), vec![
		Effect::Insert(main_el("body")),
		Effect::Insert(main_el(USERNAME_INPUT)),
		Effect::Insert(main_el(USERNAME_SUBMIT)),
	]);
	page.on_click(Scope::Main, USERNAME_SUBMIT, vec![
		Effect::Insert(main_el(PASSWORD_INPUT).hidden()),
		Effect::Insert(main_el(PASSWORD_SUBMIT)),
	]);
	common::script_home(page);
}

#[tokio::test(start_paused = true)]
async fn hidden_password_field_is_never_filled() {
	let h = harness(portal_with_hidden_password);

	let outcome = h.lifecycle.refresh().await;
	assert!(matches!(outcome, RefreshOutcome::Failed { .. }), "{outcome:?}");
	assert!(h.store.load().unwrap().is_none());

	let actions = h.browser.pages()[0].actions();
	assert!(actions.iter().any(|a| matches!(a, Action::Fill { selector, .. } if selector == USERNAME_INPUT)));
	assert!(!actions.iter().any(|a| matches!(a, Action::Fill { selector, .. } if selector == PASSWORD_INPUT)));
}

#[tokio::test(start_paused = true)]
async fn corrupt_snapshot_triggers_login() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("cookies.json"), "{ not json").unwrap();
	let h = harness_in(dir, common::script_portal);

	assert!(h.lifecycle.valid_session().is_none());
	let outcome = h.lifecycle.refresh().await;
	assert_eq!(outcome, RefreshOutcome::Completed { sequence: 1, logged_in: true });
	assert_eq!(h.store.load().unwrap().unwrap().sequence, 1);
}

#[tokio::test(start_paused = true)]
async fn empty_snapshot_is_not_a_session() {
	let dir = tempfile::tempdir().unwrap();
	let clock = common::clock();
	let store = SessionStore::new(dir.path().join("cookies.json"));
	let captured = chairside::Clock::now(clock.as_ref()) - chrono::Duration::minutes(1);
	store.save(&SessionState::new(vec![], captured, 1)).unwrap();

	let h = harness_in(dir, common::script_portal);
	assert!(h.lifecycle.valid_session().is_none());

	let outcome = h.lifecycle.refresh().await;
	assert_eq!(outcome, RefreshOutcome::Completed { sequence: 2, logged_in: true });
	assert!(!h.browser.pages()[0].actions().iter().any(|a| matches!(a, Action::SetCookies(_))));
	assert!(h.lifecycle.valid_session().is_some_and(|s| !s.cookies.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn stored_sequence_continues_across_restarts() {
	let dir = tempfile::tempdir().unwrap();
	let clock = common::clock();
	let store = SessionStore::new(dir.path().join("cookies.json"));
	let cookies = vec![Cookie::new(SESSION_COOKIE, "old", ".denticon.com")];
	store.save(&SessionState::new(cookies, chairside::Clock::now(clock.as_ref()), 7)).unwrap();

	let h = harness_in(dir, common::script_portal);
	assert_eq!(h.lifecycle.valid_session().map(|s| s.sequence), Some(7));
	assert_eq!(h.lifecycle.refresh().await, RefreshOutcome::Completed { sequence: 8, logged_in: false });
}

#[tokio::test(start_paused = true)]
async fn snapshot_expires_at_max_age() {
	let h = harness(common::script_portal);
	h.lifecycle.refresh().await;

	h.clock.advance(Duration::from_secs(115 * 60 - 1));
	assert!(h.lifecycle.valid_session().is_some());

	h.clock.advance(Duration::from_secs(1));
	assert!(h.lifecycle.valid_session().is_none());
	assert_eq!(h.lifecycle.phase(), SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn status_reports_counts_and_timings() {
	let h = harness(common::script_portal);
	let status = h.lifecycle.status(true);
	assert_eq!(status.refresh_count, 0);
	assert_eq!(status.sequence_number, None);
	assert_eq!(status.last_refresh_ago_ms, None);
	assert_eq!(status.next_refresh_in_ms, None);

	h.lifecycle.refresh().await;
	h.clock.advance(Duration::from_secs(10 * 60));

	let status = h.lifecycle.status(true);
	assert!(status.active);
	assert!(!status.refreshing);
	assert_eq!(status.phase, SessionPhase::Fresh);
	assert_eq!(status.refresh_count, 1);
	assert_eq!(status.sequence_number, Some(1));
	assert_eq!(status.last_refresh_ago_ms, Some(10 * 60 * 1000));
	assert_eq!(status.next_refresh_in_ms, Some(100 * 60 * 1000));

	let stopped = h.lifecycle.status(false);
	assert!(!stopped.active);
	assert_eq!(stopped.next_refresh_in_ms, None);
}

#[tokio::test(start_paused = true)]
async fn scheduler_refreshes_on_interval() {
	let h = harness(portal_with_latency);
	let scheduler = RefreshScheduler::new(Arc::clone(&h.lifecycle));

	let initial = scheduler.start().await;
	assert_eq!(initial, RefreshOutcome::Completed { sequence: 1, logged_in: true });
	assert!(scheduler.is_active());
	assert_eq!(scheduler.start().await, RefreshOutcome::Skipped);

	tokio::time::sleep(Duration::from_secs(110 * 60 + 5)).await;
	assert_eq!(h.lifecycle.status(true).refresh_count, 2);

	scheduler.stop().await;
	assert!(!scheduler.is_active());
}

#[tokio::test(start_paused = true)]
async fn stop_during_startup_refresh_prevents_timer() {
	let h = harness(portal_with_latency);
	let scheduler = Arc::new(RefreshScheduler::new(Arc::clone(&h.lifecycle)));

	let starting = tokio::spawn({
		let scheduler = Arc::clone(&scheduler);
		async move { scheduler.start().await }
	});
	tokio::time::sleep(Duration::from_millis(200)).await;
	assert!(h.lifecycle.is_refreshing());
	scheduler.stop().await;

	let initial = starting.await.unwrap();
	assert_eq!(initial, RefreshOutcome::Completed { sequence: 1, logged_in: true });
	assert!(!scheduler.is_active());

	tokio::time::sleep(Duration::from_secs(2 * 110 * 60)).await;
	assert_eq!(h.lifecycle.status(false).refresh_count, 1);
}

#[tokio::test(start_paused = true)]
async fn stopping_scheduler_lets_in_flight_refresh_finish() {
	let h = harness(portal_with_latency);
	let scheduler = RefreshScheduler::new(Arc::clone(&h.lifecycle));
	scheduler.start().await;
	let started = Instant::now();

	tokio::time::sleep_until(started + Duration::from_secs(110 * 60) + Duration::from_millis(200)).await;
	assert!(h.lifecycle.is_refreshing());

	scheduler.stop().await;
	tokio::time::sleep(Duration::from_secs(5)).await;
	assert!(!h.lifecycle.is_refreshing());
	assert_eq!(h.lifecycle.status(false).refresh_count, 2);

	tokio::time::sleep(Duration::from_secs(240 * 60)).await;
	assert_eq!(h.lifecycle.status(false).refresh_count, 2);
}
