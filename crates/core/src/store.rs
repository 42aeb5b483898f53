//! In-memory store of completed pairings.
//!
//! Two maps are kept: the primary `session id -> Session` map and the
//! `requester -> session id` pointer. A newer pairing moves the requester's
//! pointer but leaves the superseded session in the primary map. Durability is
//! delegated to [`SessionPersistence`](crate::SessionPersistence); a crash
//! between [`put`](SessionStore::put) and the next flush loses that session.

use std::collections::BTreeMap;

use pairlink_protocol::{RequesterId, SNAPSHOT_SCHEMA_VERSION, Session, SessionId, SessionSnapshot};
use parking_lot::RwLock;

use crate::clock::now_ts;

#[derive(Debug, Default)]
struct StoreInner {
	sessions: BTreeMap<SessionId, Session>,
	by_requester: BTreeMap<RequesterId, SessionId>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
	inner: RwLock<StoreInner>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or overwrites the session and points its requester at it.
	///
	/// Returns the session the requester pointed at before, if it was a different one.
	pub fn put(&self, session: Session) -> Option<SessionId> {
		let mut inner = self.inner.write();
		let id = session.session_id.clone();
		let previous = inner.by_requester.insert(session.requester_id, id.clone());
		inner.sessions.insert(id.clone(), session);
		previous.filter(|prev| *prev != id)
	}

	pub fn get_by_requester(&self, requester: RequesterId) -> Option<Session> {
		let inner = self.inner.read();
		let id = inner.by_requester.get(&requester)?;
		inner.sessions.get(id).cloned()
	}

	pub fn get(&self, id: &SessionId) -> Option<Session> {
		self.inner.read().sessions.get(id).cloned()
	}

	/// Drops the requester's pointer, and the session itself once nothing else points at it.
	pub fn delete_by_requester(&self, requester: RequesterId) -> Option<SessionId> {
		let mut inner = self.inner.write();
		let id = inner.by_requester.remove(&requester)?;
		if !inner.by_requester.values().any(|other| *other == id) {
			inner.sessions.remove(&id);
		}
		Some(id)
	}

	/// Number of sessions in the primary map.
	pub fn len(&self) -> usize {
		self.inner.read().sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		let inner = self.inner.read();
		inner.sessions.is_empty() && inner.by_requester.is_empty()
	}

	/// Copies both maps, in key order, into a snapshot stamped with the current time.
	pub fn snapshot(&self) -> SessionSnapshot {
		let inner = self.inner.read();
		SessionSnapshot {
			schema: SNAPSHOT_SCHEMA_VERSION,
			sessions: inner.sessions.iter().map(|(id, session)| (id.clone(), session.clone())).collect(),
			requester_sessions: inner.by_requester.iter().map(|(requester, id)| (*requester, id.clone())).collect(),
			written_at: now_ts(),
		}
	}

	/// Replaces the store's content with the snapshot.
	pub fn restore(&self, snapshot: SessionSnapshot) {
		let mut inner = self.inner.write();
		inner.sessions = snapshot.sessions.into_iter().collect();
		inner.by_requester = snapshot.requester_sessions.into_iter().collect();
	}
}
