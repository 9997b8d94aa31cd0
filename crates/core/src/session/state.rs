use std::time::Duration;

use chairside_protocol::{Cookie, SessionFile};
use chrono::{DateTime, Utc};

/// Authentication cookies plus capture metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
	pub cookies: Vec<Cookie>,
	pub captured_at: DateTime<Utc>,
	/// Position of this capture in the refresh history; 1 for the first.
	pub sequence: u64,
}

impl SessionState {
	pub fn new(cookies: Vec<Cookie>, captured_at: DateTime<Utc>, sequence: u64) -> Self {
		Self {
			cookies,
			captured_at,
			sequence,
		}
	}

	/// Time elapsed since capture, or `None` when `captured_at` lies after `now`.
	pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
		(now - self.captured_at).to_std().ok()
	}

	/// A snapshot is fresh while it holds cookies and is strictly younger than `max_age`.
	///
	/// Snapshots stamped in the future are never fresh.
	pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
		!self.cookies.is_empty() && self.age(now).is_some_and(|age| age < max_age)
	}

	pub fn to_file(&self) -> SessionFile {
		let timestamp = u64::try_from(self.captured_at.timestamp_millis()).unwrap_or_default();
		SessionFile::new(self.cookies.clone(), timestamp, self.sequence)
	}

	pub fn from_file(file: SessionFile) -> Self {
		let captured_at = i64::try_from(file.timestamp)
			.ok()
			.and_then(DateTime::<Utc>::from_timestamp_millis)
			.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
		Self {
			cookies: file.cookies,
			captured_at,
			sequence: file.refresh_count,
		}
	}
}
