//! Cleanup of values scraped from the patient chart.

use std::collections::HashSet;

use chairside_protocol::{PatientDetail, TreatmentRow};
use chrono::{Months, NaiveDate};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPatientDetails {
	pub patient_name: Option<String>,
	pub last_visit: Option<String>,
	pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTreatmentRow {
	pub date: String,
	pub description: String,
}

/// "Last, First" becomes "First Last"; anything else is only trimmed.
pub fn normalize_patient_name(raw: &str) -> String {
	let trimmed = raw.trim();
	if trimmed.contains(", ") {
		let mut parts: Vec<&str> = trimmed.split(", ").collect();
		parts.reverse();
		parts.join(" ")
	} else {
		trimmed.to_string()
	}
}

/// Keeps the text before the first comma, without hyphens.
pub fn clean_provider(raw: &str) -> Option<String> {
	let head = raw.split(',').next().unwrap_or_default().trim().replace('-', "");
	(!head.is_empty()).then_some(head)
}

pub fn clean_last_visit(raw: Option<&str>) -> Option<String> {
	raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn parse_portal_date(raw: &str) -> Option<NaiveDate> {
	NaiveDate::parse_from_str(raw.trim(), PORTAL_DATE_FORMAT).ok()
}

/// Inclusive window of one calendar month ending at `last_visit`.
///
/// Month subtraction clamps to the end of shorter months (03/31 -> 02/29).
pub fn treatment_window(last_visit: NaiveDate) -> (NaiveDate, NaiveDate) {
	let start = last_visit.checked_sub_months(Months::new(1)).unwrap_or(NaiveDate::MIN);
	(start, last_visit)
}

/// Rows dated inside the window, deduplicated by (date, description), capped at `cap`.
pub fn select_treatment_rows(rows: Vec<RawTreatmentRow>, last_visit: NaiveDate, cap: usize) -> Vec<TreatmentRow> {
	let (start, end) = treatment_window(last_visit);
	let mut seen = HashSet::new();
	rows.into_iter()
		.filter(|row| parse_portal_date(&row.date).is_some_and(|d| d >= start && d <= end))
		.map(|row| TreatmentRow {
			date: row.date.trim().to_string(),
			description: row.description.trim().to_string(),
		})
		.filter(|row| seen.insert((row.date.clone(), row.description.clone())))
		.take(cap)
		.collect()
}

pub fn build_detail(raw: RawPatientDetails, treatment_rows: Vec<TreatmentRow>) -> Result<PatientDetail> {
	let name = raw
		.patient_name
		.as_deref()
		.map(normalize_patient_name)
		.filter(|n| !n.is_empty())
		.ok_or_else(|| Error::Script {
			name: "patient_details".into(),
			message: "patient name missing from overview".into(),
		})?;

	Ok(PatientDetail {
		name,
		provider: raw.provider.as_deref().and_then(clean_provider),
		last_visit: clean_last_visit(raw.last_visit.as_deref()),
		treatment_rows,
	})
}
