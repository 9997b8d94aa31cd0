//! HTTP front end.
//!
//! Lookup answers are always HTTP 200; the outcome lives in the body.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chairside_protocol::{CookieStatusResponse, HealthResponse, LookupRequest, LookupResponse, RefreshAccepted};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::Result;

pub fn router(ctx: Arc<AppContext>) -> Router {
	Router::new()
		.route("/health", get(health_handler))
		.route("/cookie-status", get(cookie_status_handler))
		.route("/refresh-cookies", post(refresh_handler))
		.route("/lookup", post(lookup_handler))
		.with_state(ctx)
}

/// Serves until ctrl-c or SIGTERM.
pub async fn serve(ctx: Arc<AppContext>, addr: SocketAddr) -> Result<()> {
	let listener = tokio::net::TcpListener::bind(addr).await?;
	info!(target = "chairside.http", addr = %addr, "listening");
	axum::serve(listener, router(ctx)).with_graceful_shutdown(shutdown_signal()).await?;
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!(target = "chairside.http", error = %err, "could not listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				warn!(target = "chairside.http", error = %err, "could not listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => info!(target = "chairside.http", "ctrl-c received, shutting down"),
		_ = terminate => info!(target = "chairside.http", "SIGTERM received, shutting down"),
	}
}

async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
	Json(HealthResponse::new(&ctx.refresh_status(), ctx.uptime_secs()))
}

async fn cookie_status_handler(State(ctx): State<Arc<AppContext>>) -> Json<CookieStatusResponse> {
	Json(CookieStatusResponse::from(&ctx.refresh_status()))
}

async fn refresh_handler(State(ctx): State<Arc<AppContext>>) -> Json<RefreshAccepted> {
	info!(target = "chairside.http", "manual session refresh requested");
	let lifecycle = Arc::clone(ctx.lifecycle());
	tokio::spawn(async move {
		lifecycle.force_refresh().await;
	});
	Json(RefreshAccepted::default())
}

async fn lookup_handler(State(ctx): State<Arc<AppContext>>, Json(request): Json<LookupRequest>) -> Response {
	let started = Instant::now();
	let query = match request.into_args().validate() {
		Ok(query) => query,
		Err(missing) => {
			warn!(target = "chairside.http", "lookup request missing required fields");
			return Json(missing).into_response();
		}
	};

	let outcome = ctx.lookup(query).await;
	info!(
		target = "chairside.http",
		status = outcome.status(),
		elapsed_ms = started.elapsed().as_millis() as u64,
		"lookup answered"
	);
	Json(LookupResponse::from(&outcome)).into_response()
}
