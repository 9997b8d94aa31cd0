use chairside::RefreshOutcome;

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::Result;
use crate::output::{ArtifactType, ErrorCode, OutputFormat, RefreshData, ResultBuilder, print_result};

pub async fn run(config: AppConfig, format: OutputFormat) -> Result<bool> {
	let snapshot_path = config.session.snapshot_path.clone();
	let ctx = AppContext::with_cdp(config)?;
	let outcome = ctx.lifecycle().refresh().await;

	let builder = ResultBuilder::new("refresh").data(RefreshData::from(&outcome));
	let result = match &outcome {
		RefreshOutcome::Completed { .. } => builder.artifact(ArtifactType::Session, snapshot_path).build(),
		RefreshOutcome::Skipped => builder.build(),
		RefreshOutcome::Failed { reason } => builder.error(ErrorCode::SessionError, reason.clone()).build(),
	};
	let ok = result.ok;
	print_result(&result, format);
	Ok(ok)
}
