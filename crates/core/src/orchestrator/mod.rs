//! Pairing state machine.
//!
//! An attempt moves `PENDING_CODE -> AWAITING_LINK -> VERIFIED`, or ends early
//! in `FAILED`, `EXPIRED` or `CANCELLED`. Every terminal transition goes
//! through [`Orchestrator::finish`], which claims the record by removing it
//! from the registry and then releases what it owns. A transition that finds
//! the record already gone does nothing, so timeouts, sweeps, cancellations
//! and protocol events may race freely.
//!
//! Work that suspends (directory creation, connection handshake, code
//! issuance, settle delay, upload) re-checks that the record is still
//! registered before acting on the result.

mod finalize;
mod lifecycle;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use pairlink_protocol::{Notice, ProcessId, RequesterId, Session, SessionId};
use pairlink_runtime::{BlobUploader, LinkConnector, Notifier};
use tracing::{debug, info, warn};

use crate::config::PairingSettings;
use crate::error::{PairError, Result};
use crate::persist::SessionPersistence;
use crate::phone::PhoneNumber;
use crate::registry::{DeadlineTimer, ProcessRecord, ProcessRegistry, ProcessState};
use crate::store::SessionStore;

/// External services an orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
	pub connector: Arc<dyn LinkConnector>,
	pub uploader: Arc<dyn BlobUploader>,
	pub notifier: Arc<dyn Notifier>,
}

struct Inner {
	registry: Arc<ProcessRegistry>,
	persistence: Arc<SessionPersistence>,
	connector: Arc<dyn LinkConnector>,
	uploader: Arc<dyn BlobUploader>,
	notifier: Arc<dyn Notifier>,
	settings: PairingSettings,
}

/// Cheap to clone; all clones share one registry and store.
#[derive(Clone)]
pub struct Orchestrator {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Orchestrator")
			.field("settings", &self.inner.settings)
			.field("in_flight", &self.inner.registry.len())
			.finish_non_exhaustive()
	}
}

impl Orchestrator {
	pub fn new(settings: PairingSettings, registry: Arc<ProcessRegistry>, persistence: Arc<SessionPersistence>, collaborators: Collaborators) -> Self {
		let Collaborators {
			connector,
			uploader,
			notifier,
		} = collaborators;
		Self {
			inner: Arc::new(Inner {
				registry,
				persistence,
				connector,
				uploader,
				notifier,
				settings,
			}),
		}
	}

	pub fn registry(&self) -> &Arc<ProcessRegistry> {
		&self.inner.registry
	}

	pub fn store(&self) -> &Arc<SessionStore> {
		self.inner.persistence.store()
	}

	pub fn persistence(&self) -> &Arc<SessionPersistence> {
		&self.inner.persistence
	}

	pub fn settings(&self) -> &PairingSettings {
		&self.inner.settings
	}

	/// Starts a pairing attempt for `requester`.
	///
	/// Validation and the single-attempt check happen before anything is
	/// allocated. The returned record is already registered with its deadline
	/// armed; connection setup continues in the background and reports back
	/// through the notifier. Must be called from within a Tokio runtime.
	pub fn begin_pairing(&self, requester: RequesterId, raw_phone: &str) -> Result<Arc<ProcessRecord>> {
		let phone = PhoneNumber::parse(raw_phone)?;
		let record = self.inner.registry.try_begin(requester, phone, &self.inner.settings.auth_root)?;

		let timer = DeadlineTimer::schedule(self.inner.settings.deadline, {
			let this = self.clone();
			let id = record.id().clone();
			async move {
				this.expire(&id).await;
			}
		});
		record.arm_deadline(timer);

		info!(
			target = "pairlink.orchestrator",
			process = %record.id(),
			requester = %requester,
			phone = %record.phone(),
			deadline_secs = self.inner.settings.deadline.as_secs(),
			"pairing started"
		);
		tokio::spawn(self.clone().drive(Arc::clone(&record)));
		Ok(record)
	}

	/// In-flight attempt for `requester`, if any.
	pub fn active_process(&self, requester: RequesterId) -> Option<Arc<ProcessRecord>> {
		self.inner.registry.lookup_by_requester(requester)
	}

	pub fn session_for(&self, requester: RequesterId) -> Option<Session> {
		self.store().get_by_requester(requester)
	}

	/// Cancels the requester's attempt. Returns `false` if none was in flight.
	pub async fn cancel(&self, requester: RequesterId) -> bool {
		let Some(record) = self.inner.registry.lookup_by_requester(requester) else {
			return false;
		};
		if self.finish(record.id(), ProcessState::Cancelled, None).await.is_none() {
			return false;
		}
		self.notify(requester, Notice::Cancelled).await;
		true
	}

	/// Abandons the attempt because its deadline passed or it went stale.
	///
	/// Returns `false` if the attempt had already ended.
	pub async fn expire(&self, id: &ProcessId) -> bool {
		let Some(record) = self.finish(id, ProcessState::Expired, Some(&PairError::Timeout)).await else {
			return false;
		};
		self.notify(record.requester(), Notice::Expired).await;
		true
	}

	/// Ends every in-flight attempt without notifying anyone. Returns how many were ended.
	pub async fn shutdown(&self) -> usize {
		let mut ended = 0;
		for record in self.inner.registry.all() {
			if self.finish(record.id(), ProcessState::Cancelled, None).await.is_some() {
				ended += 1;
			}
		}
		if ended > 0 {
			info!(target = "pairlink.orchestrator", ended, "in-flight pairings released for shutdown");
		}
		ended
	}

	/// Forgets the requester's session and persists the change.
	pub async fn delete_session(&self, requester: RequesterId) -> Option<SessionId> {
		let deleted = self.store().delete_by_requester(requester)?;
		info!(target = "pairlink.orchestrator", requester = %requester, session = %deleted, "session deleted");
		if let Err(err) = self.inner.persistence.flush().await {
			warn!(target = "pairlink.orchestrator", error = %err, "flush after session deletion failed");
		}
		Some(deleted)
	}

	/// Single exit path for an attempt.
	///
	/// Only the caller that removes the record from the registry proceeds: it
	/// records the terminal state and releases the deadline, the connection
	/// and the auth dir. Everyone else gets `None`.
	async fn finish(&self, id: &ProcessId, terminal: ProcessState, cause: Option<&PairError>) -> Option<Arc<ProcessRecord>> {
		debug_assert!(terminal.is_terminal());
		let record = self.inner.registry.remove(id)?;
		record.advance(terminal);

		if let Err(err) = record.release().await {
			warn!(target = "pairlink.orchestrator", process = %id, path = %record.auth_dir().display(), error = %err, "failed to release auth dir");
		}

		match cause {
			Some(cause) => info!(
				target = "pairlink.orchestrator",
				process = %id,
				requester = %record.requester(),
				state = %terminal,
				age_ms = record.age().as_millis() as u64,
				error = %cause,
				"pairing ended"
			),
			None => info!(
				target = "pairlink.orchestrator",
				process = %id,
				requester = %record.requester(),
				state = %terminal,
				age_ms = record.age().as_millis() as u64,
				"pairing ended"
			),
		}
		Some(record)
	}

	/// Ends the attempt as failed and tells the requester to retry.
	async fn fail(&self, id: &ProcessId, err: PairError) {
		if let Some(record) = self.finish(id, ProcessState::Failed, Some(&err)).await {
			self.notify(record.requester(), Notice::Failed).await;
		}
	}

	fn is_live(&self, record: &ProcessRecord) -> bool {
		self.inner.registry.contains(record.id())
	}

	async fn notify(&self, requester: RequesterId, notice: Notice) {
		debug!(target = "pairlink.orchestrator", requester = %requester, notice = notice.kind(), "notifying requester");
		self.inner.notifier.notify(requester, notice).await;
	}
}
