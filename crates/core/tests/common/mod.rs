//! Scripted portal shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chairside::clock::ManualClock;
use chairside::fake::{Effect, FakeElement, FakePage};
use chairside::lookup::classifier::{OVERVIEW_FRAME, SEARCH_FRAME};
use chairside::session::login::{PASSWORD_INPUT, PASSWORD_SUBMIT, USERNAME_INPUT, USERNAME_SUBMIT};
use chairside::{PortalConfig, Scope, SessionSettings};
use chairside_protocol::Cookie;
use chrono::{TimeZone, Utc};

pub const SESSION_COOKIE: &str = "ASP.NET_SessionId";
pub const OFFICE_PICKER: &str = "#officeSearchFullList";
pub const OFFICE_OPTION: &str = "li.ui-menu-item";
pub const SEARCH_INPUT: &str = "#MenuBar_txtSearchPat";
pub const SEARCH_SUBMIT: &str = "#MenuBar_imgSearchGo";
pub const TREATMENT_PLAN_BUTTON: &str = "#MenuBar_aImgTplanCTB_tbImg";
pub const TREATMENT_PLAN_FRAME: &str = "#AdvancedTreatPlanQuickEntryIFrame";
pub const TREATMENT_PLAN_TABLE: &str = "#treatmentplan-data-table-body";

pub const OFFICES: &[&str] = &["Suave Dental Modesto [105] ", "Suave Dental Modesto North [115] ", "Suave Dental Stockton [108] "];

pub fn portal() -> PortalConfig {
	PortalConfig {
		username: Some("frontdesk".into()),
		password: Some("not-a-real-password".into()),
		..PortalConfig::default()
	}
}

pub fn clock() -> Arc<ManualClock> {
	Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()))
}

pub fn settings(dir: &tempfile::TempDir) -> SessionSettings {
	SessionSettings {
		snapshot_path: dir.path().join("cookies.json"),
		..SessionSettings::default()
	}
}

pub fn main_el(selector: &str) -> FakeElement {
	FakeElement::new(Scope::Main, selector)
}

pub fn frame_el(frame: &str, selector: &str) -> FakeElement {
	FakeElement::new(Scope::Frame(frame.into()), selector)
}

/// Two-step login form that issues the session cookie and lands on the home page.
pub fn script_login(page: &FakePage) {
	let portal = portal();
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
		Effect::AddCookies(vec![Cookie::new(SESSION_COOKIE, "fresh-session", ".denticon.com")]),
		Effect::Navigate(portal.protected_url.clone()),
	]);
}

/// Home page: the search bar when authenticated, a login redirect otherwise.
pub fn script_home(page: &FakePage) {
	let portal = portal();
	page.on_navigate(portal.protected_url.clone(), vec![Effect::WhenCookie {
		name: SESSION_COOKIE.into(),
		present: vec![
			Effect::Insert(main_el("body")),
			Effect::Insert(main_el(OFFICE_PICKER)),
			Effect::Insert(main_el(SEARCH_INPUT)),
			Effect::Insert(main_el(SEARCH_SUBMIT)),
			Effect::Insert(main_el(TREATMENT_PLAN_BUTTON).hidden()),
		],
		absent: vec![Effect::Insert(main_el("body")), Effect::Insert(main_el("#redirectLogin"))],
	}]);
	page.on_click(
		Scope::Main,
		OFFICE_PICKER,
		OFFICES.iter().map(|office| Effect::Insert(main_el(OFFICE_OPTION).text(*office))).collect(),
	);
}

pub fn script_portal(page: &FakePage) {
	script_login(page);
	script_home(page);
}

pub fn search_frame(delay: Duration) -> FakeElement {
	main_el(SEARCH_FRAME).after(delay).frame("search", "https://a1.denticon.com/ASPX/Patients/AdvancedSearchPatients.aspx")
}

pub fn overview_frame(delay: Duration) -> FakeElement {
	main_el(OVERVIEW_FRAME).after(delay).frame("overview", "https://a1.denticon.com/PatientOverview/Index?patid=P2")
}
