use std::time::Duration;

use chairside_runtime::RuntimeError;
use thiserror::Error;

use crate::session::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("navigation to {url} did not complete within {timeout:?}")]
	NavigationTimeout { url: String, timeout: Duration },

	#[error("login failed: {0}")]
	LoginFailure(String),

	#[error("element '{selector}' did not become {state} within {timeout:?}")]
	ElementNotFound { selector: String, state: &'static str, timeout: Duration },

	#[error("{0}")]
	IndeterminateResult(String),

	#[error("browser driver error: {0}")]
	Driver(String),

	#[error("script '{name}' failed: {message}")]
	Script { name: String, message: String },

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error(transparent)]
	Runtime(#[from] RuntimeError),
}

impl Error {
	/// Returns `true` for errors caused by a bounded wait running out.
	pub fn is_timeout(&self) -> bool {
		matches!(
			self,
			Error::NavigationTimeout { .. } | Error::ElementNotFound { .. } | Error::Runtime(RuntimeError::Timeout { .. })
		)
	}
}
