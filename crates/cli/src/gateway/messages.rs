//! Plain-text wording for notices and command replies.

use pairlink::ProcessRecord;
use pairlink_protocol::{Notice, Session, SessionId};

pub const WELCOME: &str = "\
Welcome to pairlink.

Commands:
/pair <number> - link a WhatsApp account
/cancel - stop the pairing in progress
/listpair - show your session
/delpair - delete your session
/status - show pairing status
/help - show this message

Example: /pair 237123456789";

pub const PAIR_USAGE: &str = "\
Usage: /pair <number>

Give the full international number, with or without + and spaces:
/pair 237123456789
/pair +237 123 456 789";

pub const BUSY: &str = "A pairing is already in progress. Wait for it to finish or use /cancel.";
pub const INVALID_NUMBER: &str = "Invalid phone number. Use the format: /pair 237123456789";
pub const START_FAILED: &str = "Could not start pairing. Please try again later.";
pub const NOTHING_TO_CANCEL: &str = "No pairing is in progress.";
pub const NO_SESSION: &str = "You have no session. Use /pair to create one.";

pub fn pairing_started(phone: &str) -> String {
	format!("Starting pairing for +{phone}. Your code will arrive in a moment.")
}

pub fn session_deleted(id: &SessionId) -> String {
	format!("Session {id} deleted.")
}

pub fn session_listing(session: &Session) -> String {
	format!(
		"Session: {}\nPhone: +{}\nCreated: {} (unix)\nStatus: VERIFIED",
		session.session_id, session.phone_number, session.created_at
	)
}

/// Service counters, plus the requester's own attempt when one is in flight.
pub fn service_status(sessions: usize, pairing: usize, own: Option<&ProcessRecord>) -> String {
	let mut text = format!("Service active.\nSessions: {sessions}\nPairings in progress: {pairing}");
	match own {
		Some(record) => text.push_str(&format!(
			"\n\nYour pairing for +{} is {} (started {}s ago).",
			record.phone(),
			record.state(),
			record.age().as_secs()
		)),
		None => text.push_str("\n\nYou have no pairing in progress."),
	}
	text
}

pub fn render_notice(notice: &Notice) -> String {
	match notice {
		Notice::CodeIssued {
			phone_number,
			code,
			expires_in_secs,
		} => format!(
			"Your pairing code for +{phone_number}:\n\n{code}\n\nOn your phone open WhatsApp > Linked devices > Link with phone number, then enter the code. It expires in {} minutes.",
			expires_in_secs / 60
		),
		Notice::Verified { session } => format!(
			"Pairing complete.\n\nSession ID: {}\n\nKeep this ID private; it identifies your linked account.",
			session.session_id
		),
		Notice::ConnectionLost => "Connection lost. Please try again with /pair.".to_string(),
		Notice::Expired => "Pairing expired. Please try again with /pair.".to_string(),
		Notice::Cancelled => "Pairing cancelled.".to_string(),
		Notice::Failed => "Pairing failed. Please try again with /pair.".to_string(),
	}
}
