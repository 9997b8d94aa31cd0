//! First-settled-wins race over named page signals.

use std::future::Future;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::select_ok;

use crate::error::Result;

/// Waits on every signal at once and returns the label of the first one that
/// succeeds.
///
/// Signals that fail are dropped from the race. Returns `None` when every
/// signal failed or `budget` ran out first. Losing signals are dropped (and
/// with them their waits) as soon as a winner is known.
pub async fn first_settled<'a, T, F>(signals: Vec<(T, F)>, budget: Duration) -> Option<T>
where
	T: Send + 'a,
	F: Future<Output = Result<()>> + Send + 'a,
{
	if signals.is_empty() {
		return None;
	}

	let racers = signals.into_iter().map(|(label, signal)| signal.map(move |outcome| outcome.map(|()| label)).boxed());

	match tokio::time::timeout(budget, select_ok(racers)).await {
		Ok(Ok((label, _losers))) => Some(label),
		Ok(Err(err)) => {
			tracing::debug!(target = "chairside.lookup", error = %err, "every raced signal failed");
			None
		}
		Err(_) => None,
	}
}
