use std::path::PathBuf;

use chairside::RefreshOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result data for the status command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
	pub path: PathBuf,
	pub exists: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sequence: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub captured_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub age_minutes: Option<u64>,
	pub fresh: bool,
	pub cookie_count: usize,
}

/// Result data for the refresh command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
	pub outcome: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sequence: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logged_in: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl From<&RefreshOutcome> for RefreshData {
	fn from(outcome: &RefreshOutcome) -> Self {
		match outcome {
			RefreshOutcome::Completed { sequence, logged_in } => Self {
				outcome: "completed".into(),
				sequence: Some(*sequence),
				logged_in: Some(*logged_in),
				reason: None,
			},
			RefreshOutcome::Skipped => Self {
				outcome: "skipped".into(),
				sequence: None,
				logged_in: None,
				reason: None,
			},
			RefreshOutcome::Failed { reason } => Self {
				outcome: "failed".into(),
				sequence: None,
				logged_in: None,
				reason: Some(reason.clone()),
			},
		}
	}
}

/// Result data for `session clear`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearData {
	pub path: PathBuf,
	pub removed: bool,
}
