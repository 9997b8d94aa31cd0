//! Cookie records as reported and accepted by the browser.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// A single browser cookie.
///
/// Field names follow the DevTools/Playwright camelCase spelling so that a
/// cookie read from the browser can be written to disk and injected back
/// without conversion. Unknown fields reported by the browser are ignored.
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	/// Expiry in seconds since the epoch; `-1` or absent means a session cookie.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: Some(domain.into()),
			path: Some("/".to_string()),
			expires: None,
			http_only: false,
			secure: false,
			same_site: None,
		}
	}

	/// Returns `true` for cookies without a positive expiry.
	pub fn is_session(&self) -> bool {
		self.expires.is_none_or(|ts| ts < 0.0)
	}

}

impl fmt::Debug for Cookie {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cookie")
			.field("name", &self.name)
			.field("value", &"<redacted>")
			.field("domain", &self.domain)
			.field("path", &self.path)
			.field("expires", &self.expires)
			.field("http_only", &self.http_only)
			.field("secure", &self.secure)
			.field("same_site", &self.same_site)
			.finish()
	}
}
