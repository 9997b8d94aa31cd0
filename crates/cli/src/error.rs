use std::path::PathBuf;

use chairside::session::StoreError;
use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read config {path}: {source}")]
	ConfigRead { path: PathBuf, source: std::io::Error },

	#[error("invalid config {path}: {source}")]
	ConfigParse { path: PathBuf, source: serde_json::Error },

	#[error("invalid bind address '{addr}'")]
	InvalidBind { addr: String },

	#[error("{0}")]
	InvalidInput(String),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Engine(#[from] chairside::Error),

	#[error("server error: {0}")]
	Server(#[from] std::io::Error),
}

impl CliError {
	/// Error code reported in the result envelope.
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::ConfigRead { .. } | CliError::ConfigParse { .. } | CliError::InvalidBind { .. } | CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::Store(_) => ErrorCode::SessionError,
			CliError::Engine(err) if err.is_timeout() => ErrorCode::Timeout,
			CliError::Engine(chairside::Error::LoginFailure(_)) => ErrorCode::AuthError,
			CliError::Engine(chairside::Error::Runtime(_)) => ErrorCode::BrowserLaunchFailed,
			CliError::Engine(chairside::Error::Config(_)) => ErrorCode::InvalidInput,
			CliError::Engine(_) => ErrorCode::InternalError,
			CliError::Server(_) => ErrorCode::IoError,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
