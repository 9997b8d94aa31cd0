use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("failed to connect to DevTools at {url}: {reason}")]
	Connect { url: String, reason: String },

	#[error("CDP error {code}: {message}")]
	Cdp { code: i64, message: String },

	#[error("CDP command '{method}' timed out after {duration:?}")]
	Timeout { method: String, duration: Duration },

	#[error("CDP protocol error: {0}")]
	Protocol(String),

	#[error("DevTools connection closed")]
	Closed,

	#[error("browser launch failed: {0}")]
	Launch(String),

	#[error("no DevTools endpoint at {endpoint}: {reason}")]
	Discovery { endpoint: String, reason: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
