//! Durable snapshots of the session store.
//!
//! The store is written as a single JSON document under the state directory.
//! Writes go to a sibling temp file which is then renamed over the snapshot,
//! so a crash mid-write leaves the previous snapshot intact.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pairlink_protocol::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::store::SessionStore;

pub const SNAPSHOT_FILE: &str = "sessions.json";

#[derive(Debug)]
pub struct SessionPersistence {
	store: Arc<SessionStore>,
	path: PathBuf,
	write_lock: Mutex<()>,
	restored: AtomicBool,
}

impl SessionPersistence {
	/// Persists `store` to `{state_dir}/sessions.json`.
	pub fn new(store: Arc<SessionStore>, state_dir: &Path) -> Self {
		Self {
			store,
			path: state_dir.join(SNAPSHOT_FILE),
			write_lock: Mutex::new(()),
			restored: AtomicBool::new(false),
		}
	}

	pub fn store(&self) -> &Arc<SessionStore> {
		&self.store
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the snapshot into the store and returns the number of sessions restored.
	///
	/// Only the first call reads the file. A missing snapshot is a fresh start;
	/// an unreadable one is logged and treated the same way.
	pub async fn restore(&self) -> usize {
		if self.restored.swap(true, Ordering::SeqCst) {
			debug!(target = "pairlink.persist", "snapshot already restored");
			return 0;
		}

		let content = match tokio::fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(err) if err.kind() == io::ErrorKind::NotFound => {
				info!(target = "pairlink.persist", path = %self.path.display(), "no session snapshot; starting empty");
				return 0;
			}
			Err(err) => {
				warn!(target = "pairlink.persist", path = %self.path.display(), error = %err, "failed to read session snapshot; starting empty");
				return 0;
			}
		};

		let snapshot: SessionSnapshot = match serde_json::from_str(&content) {
			Ok(snapshot) => snapshot,
			Err(err) => {
				warn!(target = "pairlink.persist", path = %self.path.display(), error = %err, "unparseable session snapshot; starting empty");
				return 0;
			}
		};
		if snapshot.schema != SNAPSHOT_SCHEMA_VERSION {
			warn!(target = "pairlink.persist", schema = snapshot.schema, expected = SNAPSHOT_SCHEMA_VERSION, "unexpected snapshot schema; loading anyway");
		}

		let restored = snapshot.sessions.len();
		self.store.restore(snapshot);
		info!(target = "pairlink.persist", path = %self.path.display(), sessions = restored, "session snapshot restored");
		restored
	}

	/// Writes the current store content, whatever it is.
	pub async fn flush(&self) -> Result<()> {
		let _guard = self.write_lock.lock().await;
		let snapshot = self.store.snapshot();
		let json = serde_json::to_vec_pretty(&snapshot)?;

		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		debug!(target = "pairlink.persist", path = %self.path.display(), sessions = snapshot.sessions.len(), "session snapshot written");
		Ok(())
	}

	/// Flushes unless the store is empty. Returns whether a write happened.
	pub async fn flush_if_nonempty(&self) -> Result<bool> {
		if self.store.is_empty() {
			return Ok(false);
		}
		self.flush().await?;
		Ok(true)
	}

	/// Periodic flush loop. On shutdown it flushes once more, unconditionally, and returns.
	pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
		let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if let Err(err) = self.flush_if_nonempty().await {
						warn!(target = "pairlink.persist", error = %err, "periodic flush failed");
					}
				}
				_ = shutdown.changed() => break,
			}
		}

		match self.flush().await {
			Ok(()) => info!(target = "pairlink.persist", sessions = self.store.len(), "final session snapshot written"),
			Err(err) => error!(target = "pairlink.persist", error = %err, "final flush failed; recent sessions may be lost"),
		}
	}
}
