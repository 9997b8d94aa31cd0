use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chairside_protocol::{LookupOutcome, LookupQuery, PatientDetail, TreatmentRow};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::classifier::{self, OVERVIEW_FRAME, SearchResult};
use super::extract::{self, RawPatientDetails, RawTreatmentRow};
use super::matcher::{self, CandidateRow, MAX_CANDIDATE_ROWS, RawListingRow};
use crate::config::{LookupSettings, SessionPolicy};
use crate::driver::{Browser, ClickOptions, ElementHandle, ElementState, PortalPage, Scope, Script};
use crate::error::{Error, Result};
use crate::scripts;
use crate::session::{SessionLifecycle, login};

const OFFICE_PICKER: &str = "#officeSearchFullList";
const OFFICE_OPTION: &str = "li.ui-menu-item";
const SEARCH_INPUT: &str = "#MenuBar_txtSearchPat";
const SEARCH_SUBMIT: &str = "#MenuBar_imgSearchGo";
const LISTING_ROW: &str = "#search-patients-data-table tr.search-patients-div-row";
const PATIENT_NAME: &str = ".patient-name";
const TREATMENT_PLAN_BUTTON: &str = "#MenuBar_aImgTplanCTB_tbImg";
const TREATMENT_PLAN_FRAME: &str = "#AdvancedTreatPlanQuickEntryIFrame";
const TREATMENT_PLAN_TABLE: &str = "#treatmentplan-data-table-body";
const FLASH_ALERT_FRAME_URL: &str = "PatientOverview/Index";
const FLASH_ALERT: &str = "#falsh-alert";
const FLASH_ALERT_CLOSE: &str = "#btn-close-flash-alert-modal";

const OFFICE_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_INPUT_TIMEOUT: Duration = Duration::from_secs(6);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);
const PATIENT_NAME_TIMEOUT: Duration = Duration::from_secs(6);
const ALERT_TIMEOUT: Duration = Duration::from_secs(3);

/// Logs elapsed time per lookup phase.
struct PhaseTimer {
	started: Instant,
	last: Instant,
}

impl PhaseTimer {
	fn start() -> Self {
		let now = Instant::now();
		Self { started: now, last: now }
	}

	fn mark(&mut self, phase: &'static str) {
		let now = Instant::now();
		debug!(
			target = "chairside.lookup",
			phase,
			phase_ms = now.duration_since(self.last).as_millis() as u64,
			total_ms = now.duration_since(self.started).as_millis() as u64,
			"phase complete"
		);
		self.last = now;
	}
}

/// Outcome of one lookup plus the screenshot taken when it failed.
#[derive(Debug, Clone)]
pub struct LookupReport {
	pub outcome: LookupOutcome,
	pub screenshot: Option<PathBuf>,
}

/// Runs patient lookups, one isolated browser context per request.
pub struct LookupEngine {
	browser: Arc<dyn Browser>,
	lifecycle: Arc<SessionLifecycle>,
	settings: LookupSettings,
}

impl LookupEngine {
	pub fn new(browser: Arc<dyn Browser>, lifecycle: Arc<SessionLifecycle>, settings: LookupSettings) -> Self {
		Self {
			browser,
			lifecycle,
			settings,
		}
	}

	pub fn settings(&self) -> &LookupSettings {
		&self.settings
	}

	/// Looks up one patient. Never fails: problems become an error outcome.
	pub async fn lookup(&self, query: &LookupQuery) -> LookupOutcome {
		self.lookup_report(query).await.outcome
	}

	/// [`lookup`](Self::lookup), also returning the path of the error screenshot if one was saved.
	pub async fn lookup_report(&self, query: &LookupQuery) -> LookupReport {
		let started = Instant::now();
		info!(target = "chairside.lookup", office = %query.branch, dob = %query.dob, "starting lookup");

		let page = match self.browser.new_context().await {
			Ok(page) => page,
			Err(err) => {
				error!(target = "chairside.lookup", error = %err, "could not open browser context");
				return LookupReport {
					outcome: LookupOutcome::error(err.to_string()),
					screenshot: None,
				};
			}
		};

		let (outcome, screenshot) = match self.run(page.as_ref(), query).await {
			Ok(outcome) => (outcome, None),
			Err(err) => {
				error!(target = "chairside.lookup", error = %err, "lookup failed");
				let screenshot = self.capture_failure(page.as_ref()).await;
				(LookupOutcome::error(err.to_string()), screenshot)
			}
		};

		if let Err(err) = page.close().await {
			warn!(target = "chairside.lookup", error = %err, "failed to close lookup context");
		}
		info!(
			target = "chairside.lookup",
			status = outcome.status(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"lookup finished"
		);
		LookupReport { outcome, screenshot }
	}

	async fn run(&self, page: &dyn PortalPage, query: &LookupQuery) -> Result<LookupOutcome> {
		let mut timer = PhaseTimer::start();
		let main = Scope::Main;

		if !self.settings.overlay_selectors.is_empty() {
			page.add_init_script(&scripts::overlay_hiding_script(&self.settings.overlay_selectors)).await?;
		}

		self.authenticate(page).await?;
		timer.mark("authenticate");

		select_office(page, &query.branch).await?;
		timer.mark("select office");

		page.wait_for(&main, SEARCH_INPUT, ElementState::Visible, SEARCH_INPUT_TIMEOUT).await?;
		page.fill(&main, SEARCH_INPUT, &query.dob).await?;
		page.click(&main, SEARCH_SUBMIT, ClickOptions::default()).await?;
		timer.mark("submit search");

		let result = classifier::classify(page, &self.lifecycle.portal().overview_url, self.settings.classify_settle()).await?;
		timer.mark("classify");
		info!(target = "chairside.lookup", ?result, "search classified");

		match result {
			SearchResult::NotFound => return Ok(LookupOutcome::not_found()),
			SearchResult::Overview => {}
			SearchResult::Listing { frame } => {
				let raw: Vec<RawListingRow> = evaluate_as(page, &frame, &scripts::LISTING_ROWS, json!({ "limit": MAX_CANDIDATE_ROWS })).await?;
				let rows: Vec<CandidateRow> = raw.into_iter().map(CandidateRow::from).collect();
				debug!(target = "chairside.lookup", candidates = rows.len(), "listing rows read");

				let Some(row) = matcher::find_match(&rows, &query.first_name, &query.last_name) else {
					info!(target = "chairside.lookup", candidates = rows.len(), "no candidate matched the patient name");
					return Ok(LookupOutcome::not_found());
				};
				timer.mark("match");

				open_row(page, &frame, row).await?;
				timer.mark("open row");
			}
		}

		let detail = self.extract_detail(page, &mut timer).await?;
		Ok(LookupOutcome::Found(detail))
	}

	async fn authenticate(&self, page: &dyn PortalPage) -> Result<()> {
		let portal = self.lifecycle.portal();
		if self.settings.policy == SessionPolicy::Reuse {
			match self.lifecycle.valid_session() {
				Some(snapshot) => {
					page.set_cookies(&snapshot.cookies).await?;
					if !login::needs_login(page, portal).await {
						debug!(target = "chairside.lookup", sequence = snapshot.sequence, "reusing session snapshot");
						return Ok(());
					}
					warn!(target = "chairside.lookup", sequence = snapshot.sequence, "session snapshot rejected, logging in inline");
				}
				None => warn!(target = "chairside.lookup", "no valid session snapshot, logging in inline"),
			}
		}
		login::login(page, portal, &portal.credentials()?).await
	}

	async fn extract_detail(&self, page: &dyn PortalPage, timer: &mut PhaseTimer) -> Result<PatientDetail> {
		let frame = page.frame_of(&Scope::Main, OVERVIEW_FRAME).await?;
		page.wait_for(&frame, PATIENT_NAME, ElementState::Visible, PATIENT_NAME_TIMEOUT).await?;
		let raw: RawPatientDetails = evaluate_as(page, &frame, &scripts::PATIENT_DETAILS, Value::Null).await?;
		timer.mark("overview");

		tokio::time::sleep(self.settings.detail_settle()).await;
		dismiss_flash_alert(page).await;

		let rows = match raw.last_visit.as_deref().and_then(extract::parse_portal_date) {
			Some(last_visit) => self.treatment_rows(page, last_visit).await?,
			None => {
				debug!(target = "chairside.lookup", "no usable last visit date, skipping treatment plan");
				Vec::new()
			}
		};
		timer.mark("treatment plan");

		extract::build_detail(raw, rows)
	}

	async fn treatment_rows(&self, page: &dyn PortalPage, last_visit: NaiveDate) -> Result<Vec<TreatmentRow>> {
		let main = Scope::Main;
		page.click(&main, TREATMENT_PLAN_BUTTON, ClickOptions::forced(DETAIL_TIMEOUT)).await?;
		page.wait_for(&main, TREATMENT_PLAN_FRAME, ElementState::Attached, DETAIL_TIMEOUT).await?;
		let frame = page.frame_of(&main, TREATMENT_PLAN_FRAME).await?;
		page.wait_for(&frame, TREATMENT_PLAN_TABLE, ElementState::Visible, DETAIL_TIMEOUT).await?;

		let raw: Vec<RawTreatmentRow> = evaluate_as(page, &frame, &scripts::TREATMENT_ROWS, Value::Null).await?;
		let total = raw.len();
		let rows = extract::select_treatment_rows(raw, last_visit, self.settings.max_treatment_rows);
		info!(target = "chairside.lookup", total, selected = rows.len(), %last_visit, "treatment rows extracted");
		Ok(rows)
	}

	async fn capture_failure(&self, page: &dyn PortalPage) -> Option<PathBuf> {
		let path = self
			.settings
			.screenshot_dir
			.join(format!("lookup-error-{}.png", Utc::now().format("%Y%m%dT%H%M%S%3f")));
		match page.screenshot(&path).await {
			Ok(()) => {
				info!(target = "chairside.lookup", path = %path.display(), "error screenshot saved");
				Some(path)
			}
			Err(err) => {
				warn!(target = "chairside.lookup", error = %err, "could not save error screenshot");
				None
			}
		}
	}
}

async fn evaluate_as<T: DeserializeOwned>(page: &dyn PortalPage, scope: &Scope, script: &Script, arg: Value) -> Result<T> {
	let value = page.evaluate(scope, script, arg).await?;
	serde_json::from_value(value).map_err(|e| Error::Script {
		name: script.name.to_string(),
		message: format!("unexpected result shape: {e}"),
	})
}

/// Opens the office autocomplete and clicks the entry whose trimmed text equals `office`.
async fn select_office(page: &dyn PortalPage, office: &str) -> Result<()> {
	let main = Scope::Main;
	page.wait_for(&main, OFFICE_PICKER, ElementState::Visible, OFFICE_TIMEOUT).await?;
	page.click(&main, OFFICE_PICKER, ClickOptions::default()).await?;
	page.wait_for(&main, OFFICE_OPTION, ElementState::Visible, OFFICE_TIMEOUT).await?;

	let wanted = office.trim();
	for option in page.query_all(&main, OFFICE_OPTION).await? {
		if page.read_text(&option).await?.trim() == wanted {
			page.click_element(&option).await?;
			info!(target = "chairside.lookup", office = wanted, "office selected");
			return Ok(());
		}
	}
	Err(Error::ElementNotFound {
		selector: format!("{OFFICE_OPTION} \"{wanted}\""),
		state: ElementState::Visible.as_str(),
		timeout: OFFICE_TIMEOUT,
	})
}

async fn open_row(page: &dyn PortalPage, frame: &Scope, row: &CandidateRow) -> Result<()> {
	info!(target = "chairside.lookup", row = row.row_index, patid = ?row.identifier, "opening matched row");
	match &row.identifier {
		Some(patid) => {
			let selector = format!("{LISTING_ROW}[patid=\"{patid}\"]");
			page.click(frame, &selector, ClickOptions::default()).await?;
		}
		None => {
			page.click_element(&ElementHandle {
				scope: frame.clone(),
				selector: LISTING_ROW.to_string(),
				index: row.row_index,
			})
			.await?;
		}
	}
	page.wait_for(&Scope::Main, OVERVIEW_FRAME, ElementState::Attached, DETAIL_TIMEOUT).await
}

/// Closes the flash alert inside the overview frame if one is showing. Never fails.
async fn dismiss_flash_alert(page: &dyn PortalPage) {
	let frame = match page.frame_by_url(FLASH_ALERT_FRAME_URL).await {
		Ok(Some(frame)) => frame,
		Ok(None) => {
			debug!(target = "chairside.lookup", "flash alert frame not present");
			return;
		}
		Err(err) => {
			debug!(target = "chairside.lookup", error = %err, "flash alert frame lookup failed");
			return;
		}
	};
	if !page.query_all(&frame, FLASH_ALERT).await.is_ok_and(|found| !found.is_empty()) {
		return;
	}

	info!(target = "chairside.lookup", "dismissing flash alert");
	if page.click(&frame, FLASH_ALERT_CLOSE, ClickOptions::forced(ALERT_TIMEOUT)).await.is_ok() {
		let _ = page.wait_for(&frame, FLASH_ALERT, ElementState::Hidden, ALERT_TIMEOUT).await;
		return;
	}

	let Ok(buttons) = page.query_all(&frame, "button").await else {
		return;
	};
	for button in buttons {
		let is_close = page.read_text(&button).await.is_ok_and(|text| text.to_uppercase().contains("CLOSE"));
		if is_close {
			if let Err(err) = page.click_element(&button).await {
				warn!(target = "chairside.lookup", error = %err, "could not close flash alert");
			}
			return;
		}
	}
	warn!(target = "chairside.lookup", "flash alert has no close button");
}
