//! In-flight pairing attempts.
//!
//! The registry holds at most one live [`ProcessRecord`] per requester.
//! [`ProcessRegistry::try_begin`] checks and inserts under a single lock
//! acquisition, and [`ProcessRegistry::remove`] is the point at which an
//! attempt stops being live: whichever caller gets the record back owns its
//! terminal transition.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pairlink_protocol::{ProcessId, RequesterId};
use pairlink_runtime::LinkConnection;
use pairlink_runtime::credentials::{auth_dir_for, remove_auth_dir};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::clock::now_millis;
use crate::phone::PhoneNumber;

/// The requester already has a pairing attempt in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("requester {0} already has a pairing in flight")]
pub struct Busy(pub RequesterId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
	PendingCode,
	AwaitingLink,
	Verified,
	Failed,
	Expired,
	Cancelled,
}

impl ProcessState {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Verified | Self::Failed | Self::Expired | Self::Cancelled)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::PendingCode => "PENDING_CODE",
			Self::AwaitingLink => "AWAITING_LINK",
			Self::Verified => "VERIFIED",
			Self::Failed => "FAILED",
			Self::Expired => "EXPIRED",
			Self::Cancelled => "CANCELLED",
		}
	}
}

impl std::fmt::Display for ProcessState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Owned resource that can be filled once and released once.
///
/// After release the slot refuses new values, so a connection that finishes
/// opening after the attempt ended is handed back to its opener.
#[derive(Debug)]
enum Slot<T> {
	Empty,
	Held(T),
	Released,
}

impl<T> Slot<T> {
	fn fill(&mut self, value: T) -> Result<(), T> {
		match self {
			Self::Empty => {
				*self = Self::Held(value);
				Ok(())
			}
			_ => Err(value),
		}
	}

	fn release(&mut self) -> Option<T> {
		match std::mem::replace(self, Self::Released) {
			Self::Held(value) => Some(value),
			_ => None,
		}
	}
}

/// Cancellable deadline.
///
/// `on_fire` runs once `after` has elapsed unless [`cancel`](Self::cancel) is
/// called (or the timer is dropped) first.
#[derive(Debug)]
pub struct DeadlineTimer {
	cancel: Option<oneshot::Sender<()>>,
}

impl DeadlineTimer {
	pub fn schedule<F>(after: Duration, on_fire: F) -> Self
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let (tx, rx) = oneshot::channel::<()>();
		tokio::spawn(async move {
			tokio::select! {
				biased;
				_ = rx => {}
				_ = tokio::time::sleep(after) => on_fire.await,
			}
		});
		Self { cancel: Some(tx) }
	}

	pub fn cancel(mut self) {
		if let Some(tx) = self.cancel.take() {
			let _ = tx.send(());
		}
	}
}

/// One pairing attempt: fixed identity plus the resources it owns.
pub struct ProcessRecord {
	id: ProcessId,
	requester: RequesterId,
	phone: PhoneNumber,
	auth_dir: PathBuf,
	started_at: Instant,
	state: Mutex<ProcessState>,
	connection: Mutex<Slot<Arc<dyn LinkConnection>>>,
	deadline: Mutex<Slot<DeadlineTimer>>,
	dir_released: AtomicBool,
}

impl std::fmt::Debug for ProcessRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProcessRecord")
			.field("id", &self.id)
			.field("requester", &self.requester)
			.field("phone", &self.phone)
			.field("auth_dir", &self.auth_dir)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl ProcessRecord {
	pub fn new(id: ProcessId, requester: RequesterId, phone: PhoneNumber, auth_dir: PathBuf) -> Self {
		Self {
			id,
			requester,
			phone,
			auth_dir,
			started_at: Instant::now(),
			state: Mutex::new(ProcessState::PendingCode),
			connection: Mutex::new(Slot::Empty),
			deadline: Mutex::new(Slot::Empty),
			dir_released: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> &ProcessId {
		&self.id
	}

	pub fn requester(&self) -> RequesterId {
		self.requester
	}

	pub fn phone(&self) -> &PhoneNumber {
		&self.phone
	}

	pub fn auth_dir(&self) -> &Path {
		&self.auth_dir
	}

	pub fn age(&self) -> Duration {
		self.started_at.elapsed()
	}

	pub fn state(&self) -> ProcessState {
		*self.state.lock()
	}

	/// Moves to `next`. A terminal state is never left; returns whether the state changed.
	pub fn advance(&self, next: ProcessState) -> bool {
		let mut state = self.state.lock();
		if state.is_terminal() {
			return false;
		}
		*state = next;
		true
	}

	/// Takes ownership of the live connection.
	///
	/// Hands the connection back if the record already holds one or was released.
	pub fn attach_connection(&self, connection: Arc<dyn LinkConnection>) -> Result<(), Arc<dyn LinkConnection>> {
		self.connection.lock().fill(connection)
	}

	/// Stores the deadline. A timer that arrives after release is cancelled here.
	pub fn arm_deadline(&self, timer: DeadlineTimer) -> bool {
		match self.deadline.lock().fill(timer) {
			Ok(()) => true,
			Err(timer) => {
				timer.cancel();
				false
			}
		}
	}

	/// Cancels the deadline, terminates the connection and removes the auth dir.
	///
	/// Each resource is released at most once no matter how often this runs.
	pub async fn release(&self) -> io::Result<()> {
		let timer = self.deadline.lock().release();
		if let Some(timer) = timer {
			timer.cancel();
		}

		let connection = self.connection.lock().release();
		if let Some(connection) = connection {
			connection.terminate().await;
		}

		if self.dir_released.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		let removed = remove_auth_dir(&self.auth_dir).await?;
		debug!(target = "pairlink.registry", process = %self.id, path = %self.auth_dir.display(), removed, "auth dir released");
		Ok(())
	}
}

#[derive(Debug, Default)]
struct RegistryInner {
	by_id: HashMap<ProcessId, Arc<ProcessRecord>>,
	by_requester: HashMap<RequesterId, ProcessId>,
	last_millis: u128,
}

impl RegistryInner {
	fn insert(&mut self, record: Arc<ProcessRecord>) -> Result<(), Busy> {
		if self.by_requester.contains_key(&record.requester) {
			return Err(Busy(record.requester));
		}
		self.by_requester.insert(record.requester, record.id.clone());
		self.by_id.insert(record.id.clone(), record);
		Ok(())
	}

	/// Creation timestamp that never repeats, so ids and auth dirs stay unique.
	fn next_millis(&mut self) -> u128 {
		let millis = now_millis().max(self.last_millis + 1);
		self.last_millis = millis;
		millis
	}
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
	inner: Mutex<RegistryInner>,
}

impl ProcessRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates and registers a record for `requester`, unless one is already live.
	///
	/// On `Busy` nothing is allocated or changed.
	pub fn try_begin(&self, requester: RequesterId, phone: PhoneNumber, auth_root: &Path) -> Result<Arc<ProcessRecord>, Busy> {
		let mut inner = self.inner.lock();
		if inner.by_requester.contains_key(&requester) {
			return Err(Busy(requester));
		}
		let id = ProcessId::new(requester, inner.next_millis());
		let auth_dir = auth_dir_for(auth_root, &id);
		let record = Arc::new(ProcessRecord::new(id, requester, phone, auth_dir));
		inner.insert(Arc::clone(&record))?;
		debug!(target = "pairlink.registry", process = %record.id, requester = %requester, "process registered");
		Ok(record)
	}

	/// Registers a record built elsewhere.
	pub fn register(&self, record: Arc<ProcessRecord>) -> Result<(), Busy> {
		self.inner.lock().insert(record)
	}

	pub fn lookup_by_requester(&self, requester: RequesterId) -> Option<Arc<ProcessRecord>> {
		let inner = self.inner.lock();
		let id = inner.by_requester.get(&requester)?;
		inner.by_id.get(id).cloned()
	}

	pub fn get(&self, id: &ProcessId) -> Option<Arc<ProcessRecord>> {
		self.inner.lock().by_id.get(id).cloned()
	}

	pub fn contains(&self, id: &ProcessId) -> bool {
		self.inner.lock().by_id.contains_key(id)
	}

	/// Unregisters the record. Only the first call for an id returns it.
	pub fn remove(&self, id: &ProcessId) -> Option<Arc<ProcessRecord>> {
		let mut inner = self.inner.lock();
		let record = inner.by_id.remove(id)?;
		if inner.by_requester.get(&record.requester) == Some(id) {
			inner.by_requester.remove(&record.requester);
		}
		Some(record)
	}

	pub fn all(&self) -> Vec<Arc<ProcessRecord>> {
		self.inner.lock().by_id.values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.lock().by_id.is_empty()
	}
}
