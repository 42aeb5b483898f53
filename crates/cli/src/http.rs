//! Liveness endpoint.
//!
//! * `GET /` - service status with session and in-flight pairing counts
//! * `GET /health` - constant health report with the current time

use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use pairlink::Orchestrator;
use pairlink::clock::now_ts;
use pairlink_protocol::{HealthReport, StatusReport};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub const SERVICE_NAME: &str = "pairlink";

#[derive(Clone)]
pub struct AppState {
	orchestrator: Orchestrator,
	started: Instant,
}

impl AppState {
	pub fn new(orchestrator: Orchestrator) -> Self {
		Self {
			orchestrator,
			started: Instant::now(),
		}
	}
}

pub fn router(state: AppState) -> Router {
	Router::new().route("/", get(status)).route("/health", get(health)).with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
	Json(StatusReport {
		status: "active".to_string(),
		service: SERVICE_NAME.to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		uptime_secs: state.started.elapsed().as_secs(),
		sessions: state.orchestrator.store().len(),
		pairing: state.orchestrator.registry().len(),
	})
}

async fn health() -> Json<HealthReport> {
	Json(HealthReport {
		status: "healthy".to_string(),
		timestamp: now_ts(),
	})
}

/// Serves until `shutdown` changes.
pub async fn serve(listener: TcpListener, state: AppState, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
	if let Ok(addr) = listener.local_addr() {
		info!(target = "pairlink.http", %addr, "liveness endpoint listening");
	}
	axum::serve(listener, router(state))
		.with_graceful_shutdown(async move {
			let _ = shutdown.changed().await;
		})
		.await
}
