//! Liveness endpoint payloads.

use serde::{Deserialize, Serialize};

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
	pub status: String,
	pub service: String,
	pub version: String,
	pub uptime_secs: u64,
	/// Sessions held by the session store.
	pub sessions: usize,
	/// Pairing attempts currently in flight.
	pub pairing: usize,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
	pub status: String,
	/// Unix seconds.
	pub timestamp: u64,
}
