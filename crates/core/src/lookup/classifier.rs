//! Decides what a patient search produced.
//!
//! The portal answers a search in one of two containers: a listing frame for
//! several candidates or an overview frame for a single patient. Which one
//! appears, and whether the listing has any rows, is settled by racing DOM
//! signals rather than by fixed sleeps.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::{debug, info};

use crate::driver::{ElementState, PortalPage, Scope, WaitUntil};
use crate::error::{Error, Result};
use crate::race;

pub const SEARCH_FRAME: &str = "#AdvancedSearchPatientsIFrame";
pub const OVERVIEW_FRAME: &str = "#AdvancedPatientOverviewIFrame";
/// Treatment-plan frame left over from a previous patient.
pub const STALE_VIEW_MARKER: &str = "#AdvancedTreatPlanQuickEntryIFrame";
pub const LISTING_ROWS: &str = "#search-patients-data-table tr[patid]";
pub const LISTING_EMPTY: &str = "td.dataTables_empty";

pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);
const RELOAD_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
	NotFound,
	/// Several candidates, listed inside `frame`.
	Listing { frame: Scope },
	/// Exactly one patient; the overview frame is open.
	Overview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
	Search,
	Overview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
	Rows,
	Empty,
}

/// Classifies the page state after a search was submitted.
pub async fn classify(page: &dyn PortalPage, overview_url: &str, settle: Duration) -> Result<SearchResult> {
	tokio::time::sleep(settle).await;

	if !page.query_all(&Scope::Main, STALE_VIEW_MARKER).await?.is_empty() {
		info!(target = "chairside.lookup", "stale detail view detected, reloading overview");
		page.navigate(overview_url, WaitUntil::DomContentLoaded, RELOAD_TIMEOUT).await?;
	}

	let main = Scope::Main;
	let containers: Vec<(Container, BoxFuture<'_, Result<()>>)> = vec![
		(Container::Search, page.wait_for(&main, SEARCH_FRAME, ElementState::Attached, CLASSIFY_TIMEOUT)),
		(Container::Overview, page.wait_for(&main, OVERVIEW_FRAME, ElementState::Attached, CLASSIFY_TIMEOUT)),
	];
	let container = race::first_settled(containers, CLASSIFY_TIMEOUT).await;
	debug!(target = "chairside.lookup", ?container, "result container race settled");

	match container {
		None => Err(Error::IndeterminateResult("Search result type could not be determined".into())),
		Some(Container::Overview) => Ok(SearchResult::Overview),
		Some(Container::Search) => {
			let frame = page.frame_of(&main, SEARCH_FRAME).await?;
			let signals: Vec<(Listing, BoxFuture<'_, Result<()>>)> = vec![
				(Listing::Rows, page.wait_for(&frame, LISTING_ROWS, ElementState::Visible, CLASSIFY_TIMEOUT)),
				(Listing::Empty, page.wait_for(&frame, LISTING_EMPTY, ElementState::Visible, CLASSIFY_TIMEOUT)),
			];
			let listing = race::first_settled(signals, CLASSIFY_TIMEOUT).await;
			debug!(target = "chairside.lookup", ?listing, "listing race settled");
			match listing {
				Some(Listing::Rows) => Ok(SearchResult::Listing { frame }),
				Some(Listing::Empty) => Ok(SearchResult::NotFound),
				None => Err(Error::IndeterminateResult("Search results did not load in time".into())),
			}
		}
	}
}
