//! Mapping from spoken office names to the portal's office labels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_BRANCHES: &[(&str, &str)] = &[
	("livingston", "Suave Dental Livingston [105] "),
	("los banos", "Suave Dental Los Banos [101] "),
	("merced", "Suave Dental Merced [110] "),
	("modesto", "Suave Dental Modesto [103] "),
	("riverbank", "Suave Dental Riverbank [104] "),
	("roseville", "Suave Dental Roseville [109] "),
	("stockton", "Suave Dental Stockton [102] "),
	("west sacramento", "Suave Dental West Sacramento [106] "),
	("sacramento", "Suave Dental West Sacramento [106] "),
];

/// Lower-case office keyword to exact portal label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct BranchTable(BTreeMap<String, String>);

impl Default for BranchTable {
	fn default() -> Self {
		DEFAULT_BRANCHES.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}
}

impl FromIterator<(String, String)> for BranchTable {
	fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect())
	}
}

impl From<BTreeMap<String, String>> for BranchTable {
	fn from(map: BTreeMap<String, String>) -> Self {
		map.into_iter().collect()
	}
}

impl From<BranchTable> for BTreeMap<String, String> {
	fn from(table: BranchTable) -> Self {
		table.0
	}
}

impl BranchTable {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Resolves `input` to a portal office label.
	///
	/// Labels already carrying an office number (`[`) pass through. Otherwise
	/// an exact keyword match wins, then the longest keyword contained in the
	/// input. Unknown names pass through unchanged.
	pub fn normalize(&self, input: &str) -> String {
		if input.contains('[') {
			return input.to_string();
		}
		let wanted = input.trim().to_lowercase();
		if let Some(label) = self.0.get(&wanted) {
			return label.clone();
		}

		let contained = self
			.0
			.iter()
			.filter(|(key, _)| !key.is_empty() && wanted.contains(key.as_str()))
			.max_by_key(|(key, _)| key.len());
		match contained {
			Some((_, label)) => label.clone(),
			None => {
				warn!(target = "chairside.http", branch = input, "no office mapping for branch");
				input.to_string()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_and_case_insensitive_keywords() {
		let table = BranchTable::default();
		assert_eq!(table.normalize("Stockton"), "Suave Dental Stockton [102] ");
		assert_eq!(table.normalize("  LOS BANOS "), "Suave Dental Los Banos [101] ");
	}

	#[test]
	fn longest_contained_keyword_wins() {
		let table = BranchTable::default();
		assert_eq!(table.normalize("the west sacramento office"), "Suave Dental West Sacramento [106] ");
		assert_eq!(table.normalize("sacramento downtown"), "Suave Dental West Sacramento [106] ");
		assert_eq!(table.normalize("Modesto clinic"), "Suave Dental Modesto [103] ");
	}

	#[test]
	fn labels_and_unknown_names_pass_through() {
		let table = BranchTable::default();
		assert_eq!(table.normalize("Suave Dental Merced [110] "), "Suave Dental Merced [110] ");
		assert_eq!(table.normalize("Fresno"), "Fresno");
	}

	#[test]
	fn configured_table_keys_are_lowercased() {
		let table: BranchTable = serde_json::from_value(serde_json::json!({ "Tracy": "Suave Dental Tracy [111] " })).unwrap();
		assert_eq!(table.normalize("tracy"), "Suave Dental Tracy [111] ");
	}
}
