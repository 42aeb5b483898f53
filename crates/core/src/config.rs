//! Service configuration.
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object (or no file at all) is a valid configuration. The binary applies
//! command-line and environment overrides on top before calling
//! [`ServiceConfig::validate`].

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PairError, Result};

/// Allowed range for the per-attempt deadline, in seconds.
pub const PAIRING_TIMEOUT_RANGE: RangeInclusive<u64> = 600..=1200;

/// Linking driver command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
	pub program: PathBuf,
	#[serde(default)]
	pub args: Vec<String>,
}

impl Default for DriverConfig {
	fn default() -> Self {
		Self {
			program: PathBuf::from("node"),
			args: vec!["pair-driver.js".to_string()],
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
	pub pairing_timeout_secs: u64,
	/// Age after which the sweeper reclaims an attempt regardless of its timer.
	pub stale_after_secs: u64,
	pub sweep_interval_secs: u64,
	pub flush_interval_secs: u64,
	pub code_request_delay_ms: u64,
	/// Pause after the link opens so the driver can finish writing credentials.
	pub settle_delay_ms: u64,
	pub state_dir: PathBuf,
	pub auth_root: PathBuf,
	pub upload_endpoint: Option<String>,
	pub driver: DriverConfig,
	pub port: u16,
	pub bot_token: Option<String>,
	pub poll_timeout_secs: u64,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			pairing_timeout_secs: 600,
			stale_after_secs: 900,
			sweep_interval_secs: 300,
			flush_interval_secs: 600,
			code_request_delay_ms: 1500,
			settle_delay_ms: 5000,
			state_dir: PathBuf::from("./sessions"),
			auth_root: PathBuf::from("./temp"),
			upload_endpoint: None,
			driver: DriverConfig::default(),
			port: 3000,
			bot_token: None,
			poll_timeout_secs: 10,
		}
	}
}

impl ServiceConfig {
	/// Reads the JSON file at `path`, or returns defaults when `path` is `None`.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let Some(path) = path else {
			return Ok(Self::default());
		};
		let content = std::fs::read_to_string(path).map_err(|e| PairError::Config(format!("failed to read {}: {e}", path.display())))?;
		serde_json::from_str(&content).map_err(|e| PairError::Config(format!("failed to parse {}: {e}", path.display())))
	}

	pub fn validate(&self) -> Result<()> {
		if !PAIRING_TIMEOUT_RANGE.contains(&self.pairing_timeout_secs) {
			return Err(PairError::Config(format!(
				"pairingTimeoutSecs must be within {}..={}, got {}",
				PAIRING_TIMEOUT_RANGE.start(),
				PAIRING_TIMEOUT_RANGE.end(),
				self.pairing_timeout_secs
			)));
		}
		if self.stale_after_secs <= self.pairing_timeout_secs {
			return Err(PairError::Config(format!(
				"staleAfterSecs ({}) must exceed pairingTimeoutSecs ({})",
				self.stale_after_secs, self.pairing_timeout_secs
			)));
		}
		if self.sweep_interval_secs == 0 || self.flush_interval_secs == 0 {
			return Err(PairError::Config("sweep and flush intervals must be non-zero".to_string()));
		}
		if self.upload_endpoint.as_deref().is_some_and(|endpoint| endpoint.trim().is_empty()) {
			return Err(PairError::Config("uploadEndpoint must not be empty".to_string()));
		}
		Ok(())
	}

	pub fn pairing_settings(&self) -> PairingSettings {
		PairingSettings {
			auth_root: self.auth_root.clone(),
			deadline: Duration::from_secs(self.pairing_timeout_secs),
			code_request_delay: Duration::from_millis(self.code_request_delay_ms),
			settle_delay: Duration::from_millis(self.settle_delay_ms),
		}
	}

	pub fn stale_after(&self) -> Duration {
		Duration::from_secs(self.stale_after_secs)
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs)
	}

	pub fn flush_interval(&self) -> Duration {
		Duration::from_secs(self.flush_interval_secs)
	}
}

/// Timings and paths the orchestrator needs for each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSettings {
	/// Parent of the per-attempt credential directories.
	pub auth_root: PathBuf,
	pub deadline: Duration,
	pub code_request_delay: Duration,
	pub settle_delay: Duration,
}
