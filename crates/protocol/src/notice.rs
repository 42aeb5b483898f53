//! Outbound notices addressed to a requester.
//!
//! Notices carry data only; wording is chosen by the chat gateway.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Something the requester needs to hear about their pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
	/// A linking code was issued and must be entered on the phone.
	CodeIssued { phone_number: String, code: String, expires_in_secs: u64 },
	/// Pairing completed and the session was recorded.
	Verified { session: Session },
	/// The connection closed before linking completed; the user should retry.
	ConnectionLost,
	/// The deadline elapsed before linking completed.
	Expired,
	/// The attempt was cancelled on request.
	Cancelled,
	/// Setup or finalization failed; details stay in the operator logs.
	Failed,
}

impl Notice {
	/// Stable short name used in logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::CodeIssued { .. } => "code_issued",
			Self::Verified { .. } => "verified",
			Self::ConnectionLost => "connection_lost",
			Self::Expired => "expired",
			Self::Cancelled => "cancelled",
			Self::Failed => "failed",
		}
	}
}
