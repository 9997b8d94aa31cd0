use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chairside::clock::ManualClock;
use chairside::fake::{Action, Effect, FakeBrowser, FakeElement, FakePage};
use chairside::lookup::classifier::OVERVIEW_FRAME;
use chairside::session::login::{PASSWORD_INPUT, PASSWORD_SUBMIT, USERNAME_INPUT, USERNAME_SUBMIT};
use chairside::{LookupSettings, PortalConfig, Scope, SessionSettings};
use chairside_cli::config::AppConfig;
use chairside_cli::context::AppContext;
use chairside_cli::server::router;
use chairside_protocol::Cookie;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

const OFFICE_PICKER: &str = "#officeSearchFullList";
const OFFICE_OPTION: &str = "li.ui-menu-item";
const SEARCH_INPUT: &str = "#MenuBar_txtSearchPat";
const SEARCH_SUBMIT: &str = "#MenuBar_imgSearchGo";
const OFFICES: &[&str] = &["Suave Dental Modesto [103] ", "Suave Dental Modesto North [115] ", "Suave Dental Stockton [102] "];

fn main_el(selector: &str) -> FakeElement {
	FakeElement::new(Scope::Main, selector)
}

fn overview_el(selector: &str) -> FakeElement {
	FakeElement::new(Scope::Frame("overview".into()), selector)
}

/// Portal where every search lands directly on a single patient chart.
fn script_portal(page: &FakePage) {
	let portal = PortalConfig::default();
	page.on_navigate(portal.login_url.clone(), vec![
		Effect::Insert(main_el("body")),
		Effect::Insert(main_el(USERNAME_INPUT)),
		Effect::Insert(main_el(USERNAME_SUBMIT)),
	]);
	page.on_click(Scope::Main, USERNAME_SUBMIT, vec![
		Effect::Insert(main_el(PASSWORD_INPUT)),
		Effect::Insert(main_el(PASSWORD_SUBMIT)),
	]);
	page.on_click(Scope::Main, PASSWORD_SUBMIT, vec![
		Effect::AddCookies(vec![Cookie::new("ASP.NET_SessionId", "fresh-session", ".denticon.com")]),
		Effect::Navigate(portal.protected_url.clone()),
	]);
	page.on_navigate(portal.protected_url.clone(), vec![Effect::WhenCookie {
		name: "ASP.NET_SessionId".into(),
		present: vec![
			Effect::Insert(main_el("body")),
			Effect::Insert(main_el(OFFICE_PICKER)),
			Effect::Insert(main_el(SEARCH_INPUT)),
			Effect::Insert(main_el(SEARCH_SUBMIT)),
		],
		absent: vec![Effect::Insert(main_el("body")), Effect::Insert(main_el("#redirectLogin"))],
	}]);
	page.on_click(
		Scope::Main,
		OFFICE_PICKER,
		OFFICES.iter().map(|office| Effect::Insert(main_el(OFFICE_OPTION).text(*office))).collect(),
	);

	let delay = Duration::from_millis(500);
	page.on_click(Scope::Main, SEARCH_SUBMIT, vec![
		Effect::Insert(
			main_el(OVERVIEW_FRAME)
				.after(delay)
				.frame("overview", "https://a1.denticon.com/PatientOverview/Index?patid=P7"),
		),
		Effect::Insert(overview_el(".patient-name").after(delay).text("Doe, Jane")),
	]);
	page.respond(Scope::Frame("overview".into()), "patient_details", json!({
		"patientName": "Doe, Jane",
		"lastVisit": "not yet",
		"provider": "Smith-Jones, DDS",
	}));
}

struct Service {
	_dir: tempfile::TempDir,
	browser: Arc<FakeBrowser>,
	ctx: Arc<AppContext>,
	app: Router,
}

fn service() -> Service {
	let dir = tempfile::tempdir().unwrap();
	let config = AppConfig {
		portal: PortalConfig {
			username: Some("frontdesk".into()),
			password: Some("not-a-real-password".into()),
			..PortalConfig::default()
		},
		session: SessionSettings {
			snapshot_path: dir.path().join("cookies.json"),
			..SessionSettings::default()
		},
		lookup: LookupSettings {
			screenshot_dir: dir.path().join("screenshots"),
			..LookupSettings::default()
		},
		..AppConfig::default()
	};
	let browser = Arc::new(FakeBrowser::new(script_portal));
	let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()));
	let ctx = Arc::new(AppContext::new(config, browser.clone(), clock).unwrap());
	Service {
		_dir: dir,
		browser,
		app: router(Arc::clone(&ctx)),
		ctx,
	}
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
	let builder = Request::builder().method(method).uri(uri);
	let request = match body {
		Some(body) => builder
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap(),
		None => builder.body(Body::empty()).unwrap(),
	};
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	(status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(start_paused = true)]
async fn health_reports_never_before_first_refresh() {
	let svc = service();
	let (status, body) = call(&svc.app, "GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "ok");
	assert_eq!(body["cookieRefresh"]["active"], false);
	assert_eq!(body["cookieRefresh"]["lastRefreshAgo"], "never");
	assert_eq!(body["cookieRefresh"]["nextRefreshIn"], "N/A");
	assert_eq!(body["cookieRefresh"]["totalRefreshes"], 0);
}

#[tokio::test(start_paused = true)]
async fn cookie_status_after_refresh() {
	let svc = service();
	svc.ctx.lifecycle().refresh().await;

	let (status, body) = call(&svc.app, "GET", "/cookie-status", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["isRefreshing"], false);
	assert_eq!(body["refreshCount"], 1);
	assert_eq!(body["lastRefreshAgoMinutes"], 0);
	assert!(body["lastRefreshTime"].is_string());
}

#[tokio::test(start_paused = true)]
async fn lookup_without_required_fields_is_rejected() {
	let svc = service();
	let (status, body) = call(&svc.app, "POST", "/lookup", Some(json!({ "branch": "Modesto", "dob": "  " }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["error"], "Missing required fields");
	assert_eq!(body["message"], "Please provide branch, firstName, lastName, and dob");
	assert_eq!(svc.browser.contexts_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn lookup_maps_spoken_branch_to_portal_office() {
	let svc = service();
	svc.ctx.lifecycle().refresh().await;

	let (status, body) = call(
		&svc.app,
		"POST",
		"/lookup",
		Some(json!({ "branch": "modesto", "dob": "01/02/1980", "firstName": "Jane", "lastName": "Doe" })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "found");
	assert_eq!(body["PatientName"], "Jane Doe");
	assert_eq!(body["DoctorName"], "SmithJones");
	assert_eq!(body["treatmentrows"], "N/A");

	let page = svc.browser.pages().pop().unwrap();
	assert!(page.actions().iter().any(|action| matches!(
		action,
		Action::ClickElement { text, .. } if text.trim() == "Suave Dental Modesto [103]"
	)));
}

#[tokio::test(start_paused = true)]
async fn lookup_accepts_tool_call_envelope_with_encoded_arguments() {
	let svc = service();
	svc.ctx.lifecycle().refresh().await;

	let arguments = json!({ "suaveBranch": "Stockton", "dob": "01/02/1980", "firstName": "Jane", "lastName": "Doe" }).to_string();
	let envelope = json!({
		"message": {
			"toolCalls": [{ "id": "call_1", "function": { "name": "lookupPatient", "arguments": arguments } }]
		}
	});
	let (_, body) = call(&svc.app, "POST", "/lookup", Some(envelope)).await;

	assert_eq!(body["status"], "found");
	assert_eq!(body["PatientName"], "Jane Doe");
}

#[tokio::test(start_paused = true)]
async fn refresh_cookies_runs_in_background() {
	let svc = service();
	let (status, body) = call(&svc.app, "POST", "/refresh-cookies", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "processing");
	assert_eq!(body["message"], "Cookie refresh initiated in background");

	for _ in 0..120 {
		if svc.ctx.refresh_status().refresh_count == 1 {
			break;
		}
		tokio::time::sleep(Duration::from_secs(1)).await;
	}
	assert_eq!(svc.ctx.refresh_status().refresh_count, 1);
	assert!(svc.ctx.lifecycle().valid_session().is_some());
}
