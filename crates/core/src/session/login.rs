//! Portal sign-in and authentication check.

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::config::{Credentials, PortalConfig};
use crate::driver::{ClickOptions, ElementState, PortalPage, Scope, WaitUntil};
use crate::error::{Error, Result};
use crate::race;

pub const USERNAME_INPUT: &str = "#loginForm > form > div.form-group > input";
pub const USERNAME_SUBMIT: &str = "#btnLogin";
pub const PASSWORD_INPUT: &str = "input[name=\"txtPassword\"]";
pub const PASSWORD_SUBMIT: &str = "#aLogin";
/// Present on the protected page only when the session is not authenticated.
pub const LOGIN_REQUIRED_MARKER: &str = "#redirectLogin, #loginForm";

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const FIELD_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostSubmit {
	Navigated,
	LeftLoginPage,
	PageReady,
}

fn on_login_page(url: &str) -> bool {
	url.contains("/login")
}

/// Runs the two-step sign-in on `page`.
///
/// After the password is submitted, navigation completing, the URL leaving
/// the login page and the document body being attached all race; any of
/// them settles the login. If none does within the navigation budget, the
/// current URL decides.
pub async fn login(page: &dyn PortalPage, portal: &PortalConfig, credentials: &Credentials) -> Result<()> {
	info!(target = "chairside.session", "performing login");
	let main = Scope::Main;

	page.navigate(&portal.login_url, WaitUntil::Load, NAVIGATION_TIMEOUT).await?;
	page.wait_for(&main, USERNAME_INPUT, ElementState::Visible, FIELD_TIMEOUT).await?;
	page.fill(&main, USERNAME_INPUT, &credentials.username).await?;
	page.click(&main, USERNAME_SUBMIT, ClickOptions::default()).await?;
	debug!(target = "chairside.session", "username submitted");

	page.wait_for(&main, PASSWORD_INPUT, ElementState::Visible, FIELD_TIMEOUT).await?;
	page.fill(&main, PASSWORD_INPUT, &credentials.password).await?;
	page.click(&main, PASSWORD_SUBMIT, ClickOptions::default()).await?;
	debug!(target = "chairside.session", "password submitted");

	let signals: Vec<(PostSubmit, BoxFuture<'_, Result<()>>)> = vec![
		(PostSubmit::Navigated, page.wait_for_navigation(WaitUntil::Load, NAVIGATION_TIMEOUT)),
		(PostSubmit::LeftLoginPage, wait_until_off_login(page, NAVIGATION_TIMEOUT).boxed()),
		(PostSubmit::PageReady, page.wait_for(&main, "body", ElementState::Attached, NAVIGATION_TIMEOUT)),
	];

	match race::first_settled(signals, NAVIGATION_TIMEOUT).await {
		Some(signal) => {
			info!(target = "chairside.session", ?signal, "login successful");
			Ok(())
		}
		None => {
			let url = page.current_url().await?;
			if on_login_page(&url) {
				warn!(target = "chairside.session", "login did not leave the login page");
				Err(Error::LoginFailure("still on the login page after submitting credentials".into()))
			} else {
				info!(target = "chairside.session", "login successful (no navigation observed)");
				Ok(())
			}
		}
	}
}

async fn wait_until_off_login(page: &dyn PortalPage, timeout: Duration) -> Result<()> {
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		if page.current_url().await.is_ok_and(|url| !on_login_page(&url)) {
			return Ok(());
		}
		if tokio::time::Instant::now() >= deadline {
			return Err(Error::NavigationTimeout {
				url: "<away from login>".into(),
				timeout,
			});
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Loads the protected page and reports whether it asks for a login.
///
/// A failed navigation counts as "login required".
pub async fn needs_login(page: &dyn PortalPage, portal: &PortalConfig) -> bool {
	if let Err(err) = page.navigate(&portal.protected_url, WaitUntil::Load, NAVIGATION_TIMEOUT).await {
		warn!(target = "chairside.session", error = %err, "verification navigation failed; assuming login required");
		return true;
	}
	match page.query_all(&Scope::Main, LOGIN_REQUIRED_MARKER).await {
		Ok(markers) => {
			let required = !markers.is_empty();
			debug!(target = "chairside.session", required, "login marker checked");
			required
		}
		Err(err) => {
			warn!(target = "chairside.session", error = %err, "login marker check failed; assuming login required");
			true
		}
	}
}
