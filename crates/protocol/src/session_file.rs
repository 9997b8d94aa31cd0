//! On-disk layout of the persisted session snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;

/// Persisted session snapshot.
///
/// ```json
/// { "cookies": [...], "timestamp": 1718000000000, "refreshedAt": "2024-06-10T06:13:20Z", "refreshCount": 3 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
	pub cookies: Vec<Cookie>,
	/// Capture time in milliseconds since the Unix epoch.
	pub timestamp: u64,
	/// Human-readable copy of `timestamp`; informational only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refreshed_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub refresh_count: u64,
}

impl SessionFile {
	pub fn new(cookies: Vec<Cookie>, timestamp: u64, refresh_count: u64) -> Self {
		Self {
			cookies,
			timestamp,
			refreshed_at: DateTime::<Utc>::from_timestamp_millis(timestamp as i64),
			refresh_count,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_file_without_optional_fields() {
		let file: SessionFile = serde_json::from_str(r#"{"cookies":[],"timestamp":1700000000000}"#).unwrap();
		assert_eq!(file.refresh_count, 0);
		assert!(file.refreshed_at.is_none());
	}

	#[test]
	fn new_derives_refreshed_at_from_timestamp() {
		let file = SessionFile::new(vec![Cookie::new("a", "b", "c")], 1_700_000_000_000, 4);
		let json = serde_json::to_value(&file).unwrap();
		assert_eq!(json["timestamp"], 1_700_000_000_000u64);
		assert_eq!(json["refreshCount"], 4);
		assert_eq!(json["refreshedAt"], "2023-11-14T22:13:20Z");
		assert_eq!(json["cookies"][0]["name"], "a");
	}
}
