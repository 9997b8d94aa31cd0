use std::sync::Arc;

use chairside::RefreshOutcome;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::Result;
use crate::server;

/// Starts the refresh scheduler, then serves HTTP until a shutdown signal.
pub async fn run(config: AppConfig) -> Result<()> {
	let addr = config.server.socket_addr()?;
	if let Err(err) = config.portal.credentials() {
		warn!(target = "chairside.http", error = %err, "portal credentials not configured; logins will fail");
	}
	info!(target = "chairside.http", branches = config.branches.len(), "starting chairside service");

	let ctx = Arc::new(AppContext::with_cdp(config)?);
	match ctx.scheduler().start().await {
		RefreshOutcome::Failed { reason } => error!(target = "chairside.session", %reason, "startup refresh failed; lookups will log in inline"),
		outcome => info!(target = "chairside.session", ?outcome, "startup refresh finished"),
	}

	let served = server::serve(Arc::clone(&ctx), addr).await;
	ctx.scheduler().stop().await;
	info!(target = "chairside.http", "service stopped");
	served
}
