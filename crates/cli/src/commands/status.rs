use chairside::{Clock, SessionStore, SystemClock};

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::{DiagnosticLevel, OutputFormat, ResultBuilder, SnapshotData, print_result};

/// Reports the stored snapshot without starting a browser.
pub fn run(config: &AppConfig, format: OutputFormat) -> Result<bool> {
	let path = config.session.snapshot_path.clone();
	let store = SessionStore::new(path.clone());
	let builder = ResultBuilder::new("status");

	let result = match store.load() {
		Ok(None) => builder
			.data(SnapshotData {
				path,
				exists: false,
				sequence: None,
				captured_at: None,
				age_minutes: None,
				fresh: false,
				cookie_count: 0,
			})
			.diagnostic(DiagnosticLevel::Info, "no session snapshot; the next refresh will log in")
			.build(),
		Ok(Some(state)) => {
			let age = state.age(SystemClock.now());
			let fresh = state.is_fresh(SystemClock.now(), config.session.max_age());
			let builder = builder.data(SnapshotData {
				path,
				exists: true,
				sequence: Some(state.sequence),
				captured_at: Some(state.captured_at),
				age_minutes: age.map(|a| a.as_secs() / 60),
				fresh,
				cookie_count: state.cookies.len(),
			});
			if fresh {
				builder.build()
			} else {
				builder.diagnostic(DiagnosticLevel::Warning, "snapshot is older than the maximum age").build()
			}
		}
		Err(err) => {
			let err = CliError::from(err);
			builder.error(err.code(), err.to_string()).build()
		}
	};

	let ok = result.ok;
	print_result(&result, format);
	Ok(ok)
}
