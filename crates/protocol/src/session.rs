//! Completed-pairing records and the persisted snapshot format.

use serde::{Deserialize, Serialize};

use crate::ids::{RequesterId, SessionId};

/// Schema version written into every session snapshot.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Status of a persisted session. Only verified pairings are ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
	#[default]
	Verified,
}

/// Durable record of a successfully completed pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub session_id: SessionId,
	pub requester_id: RequesterId,
	pub phone_number: String,
	/// Unix seconds.
	pub created_at: u64,
	#[serde(default)]
	pub status: SessionStatus,
	#[serde(default = "default_active")]
	pub is_active: bool,
}

fn default_active() -> bool {
	true
}

impl Session {
	/// Builds the record written on a verified pairing.
	pub fn verified(session_id: SessionId, requester_id: RequesterId, phone_number: impl Into<String>, created_at: u64) -> Self {
		Self {
			session_id,
			requester_id,
			phone_number: phone_number.into(),
			created_at,
			status: SessionStatus::Verified,
			is_active: true,
		}
	}
}

/// On-disk format of the session store.
///
/// ```json
/// {
///   "schema": 1,
///   "sessions": [["AbC123x1234", { "sessionId": "AbC123x1234", ... }]],
///   "requesterSessions": [[42, "AbC123x1234"]],
///   "writtenAt": 1700000000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	pub schema: u32,
	#[serde(default)]
	pub sessions: Vec<(SessionId, Session)>,
	#[serde(default)]
	pub requester_sessions: Vec<(RequesterId, SessionId)>,
	/// Unix seconds at which the snapshot was taken.
	#[serde(default)]
	pub written_at: u64,
}

impl Default for SessionSnapshot {
	fn default() -> Self {
		Self {
			schema: SNAPSHOT_SCHEMA_VERSION,
			sessions: Vec::new(),
			requester_sessions: Vec::new(),
			written_at: 0,
		}
	}
}

impl SessionSnapshot {
	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty() && self.requester_sessions.is_empty()
	}
}
