use chairside::SessionStore;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::output::{ClearData, OutputFormat, ResultBuilder, print_result};

pub fn clear(config: &AppConfig, format: OutputFormat) -> Result<bool> {
	let path = config.session.snapshot_path.clone();
	let removed = SessionStore::new(path.clone()).clear()?;
	info!(target = "chairside.session", path = %path.display(), removed, "session snapshot cleared");

	let result = ResultBuilder::new("session.clear").data(ClearData { path, removed }).build();
	print_result(&result, format);
	Ok(true)
}
