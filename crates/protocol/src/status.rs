//! Refresh status view and the health/status responses derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the session lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
	Idle,
	Refreshing,
	Fresh,
}

/// Read-only view of the lifecycle manager, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
	pub active: bool,
	pub refreshing: bool,
	pub phase: SessionPhase,
	pub last_refresh_at: Option<DateTime<Utc>>,
	pub refresh_count: u64,
	pub sequence_number: Option<u64>,
	pub last_refresh_ago_ms: Option<u64>,
	pub next_refresh_in_ms: Option<u64>,
}

fn round_minutes(ms: u64) -> u64 {
	(ms + 30_000) / 60_000
}

/// `cookieRefresh` block of the health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
	pub active: bool,
	pub currently_refreshing: bool,
	pub last_refresh_ago: String,
	pub next_refresh_in: String,
	pub total_refreshes: u64,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub status: String,
	pub uptime_secs: u64,
	pub cookie_refresh: RefreshSummary,
}

impl HealthResponse {
	pub fn new(status: &RefreshStatus, uptime_secs: u64) -> Self {
		Self {
			status: "ok".to_string(),
			uptime_secs,
			cookie_refresh: RefreshSummary {
				active: status.active,
				currently_refreshing: status.refreshing,
				last_refresh_ago: match status.last_refresh_ago_ms {
					Some(ms) => format!("{} minutes ago", round_minutes(ms)),
					None => "never".to_string(),
				},
				next_refresh_in: match status.next_refresh_in_ms {
					Some(ms) => format!("{} minutes", round_minutes(ms)),
					None => "N/A".to_string(),
				},
				total_refreshes: status.refresh_count,
			},
		}
	}
}

/// Body of `GET /cookie-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieStatusResponse {
	pub is_active: bool,
	pub is_refreshing: bool,
	pub last_refresh_time: Option<DateTime<Utc>>,
	pub last_refresh_ago_minutes: Option<u64>,
	pub next_refresh_in_minutes: Option<u64>,
	pub refresh_count: u64,
}

impl From<&RefreshStatus> for CookieStatusResponse {
	fn from(status: &RefreshStatus) -> Self {
		Self {
			is_active: status.active,
			is_refreshing: status.refreshing,
			last_refresh_time: status.last_refresh_at,
			last_refresh_ago_minutes: status.last_refresh_ago_ms.map(round_minutes),
			next_refresh_in_minutes: status.next_refresh_in_ms.map(round_minutes),
			refresh_count: status.refresh_count,
		}
	}
}

/// Body of `POST /refresh-cookies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAccepted {
	pub message: String,
	pub status: String,
}

impl Default for RefreshAccepted {
	fn default() -> Self {
		Self {
			message: "Cookie refresh initiated in background".to_string(),
			status: "processing".to_string(),
		}
	}
}
