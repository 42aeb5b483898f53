//! Periodic reclamation of stale pairing attempts.
//!
//! Runs independently of the per-attempt deadline timers and catches any
//! attempt that outlived `stale_after`, whatever the reason its own timer
//! did not end it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone)]
pub struct Sweeper {
	orchestrator: Orchestrator,
	interval: Duration,
	stale_after: Duration,
}

impl Sweeper {
	pub fn new(orchestrator: Orchestrator, interval: Duration, stale_after: Duration) -> Self {
		Self {
			orchestrator,
			interval,
			stale_after,
		}
	}

	/// Expires every registered attempt older than `stale_after`. Returns how many were expired.
	pub async fn sweep_once(&self) -> usize {
		let mut expired = 0;
		for record in self.orchestrator.registry().all() {
			let age = record.age();
			if age <= self.stale_after {
				continue;
			}
			debug!(target = "pairlink.sweeper", process = %record.id(), age_secs = age.as_secs(), "stale pairing found");
			if self.orchestrator.expire(record.id()).await {
				expired += 1;
			}
		}
		if expired > 0 {
			info!(target = "pairlink.sweeper", expired, "stale pairings reclaimed");
		}
		expired
	}

	/// Sweeps every `interval` until `shutdown` changes.
	pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
		let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					self.sweep_once().await;
				}
				_ = shutdown.changed() => break,
			}
		}
		debug!(target = "pairlink.sweeper", "sweeper stopped");
	}
}
