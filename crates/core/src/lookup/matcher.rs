//! Name matching over the rows of a multi-result listing.

use serde::Deserialize;

/// Rows past this position are never inspected.
pub const MAX_CANDIDATE_ROWS: usize = 10;
const MAX_ROW_TEXT_CHARS: usize = 100;

/// Row as returned by the listing script.
#[derive(Debug, Clone, Deserialize)]
pub struct RawListingRow {
	pub index: usize,
	pub patid: Option<String>,
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
	pub row_index: usize,
	/// Portal patient id (`patid` attribute), when the row carries one.
	pub identifier: Option<String>,
	pub normalized_text: String,
}

impl CandidateRow {
	pub fn new(row_index: usize, identifier: Option<String>, display_text: &str) -> Self {
		let truncated: String = display_text.trim().chars().take(MAX_ROW_TEXT_CHARS).collect();
		Self {
			row_index,
			identifier,
			normalized_text: fold(&truncated),
		}
	}
}

impl From<RawListingRow> for CandidateRow {
	fn from(raw: RawListingRow) -> Self {
		CandidateRow::new(raw.index, raw.patid.filter(|id| !id.is_empty()), raw.text.as_deref().unwrap_or_default())
	}
}

/// Lower-cases and keeps only alphanumeric characters.
pub fn fold(text: &str) -> String {
	text.chars().flat_map(char::to_lowercase).filter(|c| c.is_alphanumeric()).collect()
}

/// First row (in listing order) whose text contains `firstlast` or `lastfirst`.
///
/// Containment is deliberately loose: "Ann Lee" also matches "Joann Leeds".
/// An empty first or last name never matches.
pub fn find_match<'a>(rows: &'a [CandidateRow], first_name: &str, last_name: &str) -> Option<&'a CandidateRow> {
	let first = fold(first_name);
	let last = fold(last_name);
	if first.is_empty() || last.is_empty() {
		return None;
	}
	let first_last = format!("{first}{last}");
	let last_first = format!("{last}{first}");

	rows.iter()
		.take(MAX_CANDIDATE_ROWS)
		.find(|row| row.normalized_text.contains(&first_last) || row.normalized_text.contains(&last_first))
}
