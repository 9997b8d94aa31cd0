use chairside_protocol::{LookupArgs, LookupOutcome};
use tracing::info;

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::{CliError, Result};
use crate::output::{ArtifactType, ErrorCode, OutputFormat, ResultBuilder, print_result};

pub async fn run(config: AppConfig, args: LookupArgs, format: OutputFormat) -> Result<bool> {
	let query = args.validate().map_err(|missing| CliError::InvalidInput(missing.message))?;

	let ctx = AppContext::with_cdp(config)?;
	let report = ctx.lookup_report(query).await;
	info!(target = "chairside.lookup", status = report.outcome.status(), "lookup command finished");

	let builder = ResultBuilder::<LookupOutcome>::new("lookup");
	let builder = match report.screenshot {
		Some(path) => builder.artifact(ArtifactType::Screenshot, path),
		None => builder,
	};
	let result = match report.outcome {
		LookupOutcome::AmbiguousOrError { message } => builder.error(ErrorCode::LookupFailed, message).build(),
		outcome => builder.data(outcome).build(),
	};
	let ok = result.ok;
	print_result(&result, format);
	Ok(ok)
}
