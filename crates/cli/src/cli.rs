use std::path::PathBuf;

use clap::Parser;
use pairlink::{PairError, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "pairlink")]
#[command(about = "Pairing service - links messaging accounts on request from a chat")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON configuration file; every field is optional
	#[arg(short, long, value_name = "FILE", env = "PAIRLINK_CONFIG")]
	pub config: Option<PathBuf>,

	/// Port for the liveness endpoint
	#[arg(long, env = "PORT")]
	pub port: Option<u16>,

	/// Chat gateway bot token
	#[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
	pub bot_token: Option<String>,

	/// Directory holding the session snapshot
	#[arg(long, value_name = "DIR")]
	pub state_dir: Option<PathBuf>,

	/// Parent directory of per-attempt credential directories
	#[arg(long, value_name = "DIR")]
	pub auth_root: Option<PathBuf>,

	/// Endpoint credential files are uploaded to
	#[arg(long, value_name = "URL", env = "UPLOAD_ENDPOINT")]
	pub upload_endpoint: Option<String>,

	/// Pairing deadline in seconds (600-1200)
	#[arg(long, value_name = "SECS")]
	pub pairing_timeout: Option<u64>,

	/// Age in seconds after which the sweeper reclaims an attempt; must exceed the deadline
	#[arg(long, value_name = "SECS")]
	pub stale_after: Option<u64>,
}

impl Cli {
	/// Loads the config file, applies command-line and environment overrides, and validates.
	pub fn service_config(&self) -> Result<ServiceConfig, PairError> {
		let mut config = ServiceConfig::load(self.config.as_deref())?;
		self.apply_overrides(&mut config);
		config.validate()?;
		Ok(config)
	}

	fn apply_overrides(&self, config: &mut ServiceConfig) {
		if let Some(port) = self.port {
			config.port = port;
		}
		if let Some(token) = &self.bot_token {
			config.bot_token = Some(token.clone());
		}
		if let Some(dir) = &self.state_dir {
			config.state_dir = dir.clone();
		}
		if let Some(dir) = &self.auth_root {
			config.auth_root = dir.clone();
		}
		if let Some(endpoint) = &self.upload_endpoint {
			config.upload_endpoint = Some(endpoint.clone());
		}
		if let Some(secs) = self.pairing_timeout {
			config.pairing_timeout_secs = secs;
		}
		if let Some(secs) = self.stale_after {
			config.stale_after_secs = secs;
		}
	}
}
