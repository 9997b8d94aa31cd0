use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bumped whenever a field of [`CommandResult`] changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// Envelope printed by every one-shot command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub schema_version: u32,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub artifacts: Vec<Artifact>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Failure classes a calling script can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	BrowserLaunchFailed,
	Timeout,
	IoError,
	SessionError,
	InvalidInput,
	AuthError,
	LookupFailed,
	InternalError,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::SessionError => "SESSION_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::AuthError => "AUTH_ERROR",
			ErrorCode::LookupFailed => "LOOKUP_FAILED",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// File a command wrote or refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
	#[serde(rename = "type")]
	pub kind: ArtifactType,
	pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
	/// The cookie snapshot.
	Session,
	/// Page capture taken after a failed lookup.
	Screenshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Diagnostic {
	pub level: DiagnosticLevel,
	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
}

impl DiagnosticLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			DiagnosticLevel::Info => "info",
			DiagnosticLevel::Warning => "warning",
		}
	}
}
