//! Linking-protocol events and the JSON-lines driver wire format.
//!
//! The driver is a subprocess that owns the actual linking protocol. It
//! speaks newline-delimited JSON on stdin/stdout:
//!
//! ```json
//! {"event": "ready", "registered": false}
//! {"id": 0, "method": "requestPairingCode", "params": {"phoneNumber": "237123456789"}}
//! {"id": 0, "result": {"code": "ABCD-1234"}}
//! {"event": "connection.update", "connection": "close", "statusCode": 401}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle event reported by a linking connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
	/// Credential material in the auth directory changed.
	CredentialsUpdated,
	/// The account link completed; credentials are usable.
	ConnectionOpen,
	/// The connection closed for the given reason.
	ConnectionClosed(DisconnectReason),
}

/// Why a linking connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
	ConnectionClosed,
	ConnectionLost,
	LoggedOut,
	Forbidden,
	MultideviceMismatch,
	ConnectionReplaced,
	BadSession,
	UnavailableService,
	RestartRequired,
	Other(u16),
}

impl DisconnectReason {
	pub fn from_code(code: u16) -> Self {
		match code {
			401 => Self::LoggedOut,
			403 => Self::Forbidden,
			408 => Self::ConnectionLost,
			411 => Self::MultideviceMismatch,
			428 => Self::ConnectionClosed,
			440 => Self::ConnectionReplaced,
			500 => Self::BadSession,
			503 => Self::UnavailableService,
			515 => Self::RestartRequired,
			other => Self::Other(other),
		}
	}

	pub fn code(self) -> u16 {
		match self {
			Self::LoggedOut => 401,
			Self::Forbidden => 403,
			Self::ConnectionLost => 408,
			Self::MultideviceMismatch => 411,
			Self::ConnectionClosed => 428,
			Self::ConnectionReplaced => 440,
			Self::BadSession => 500,
			Self::UnavailableService => 503,
			Self::RestartRequired => 515,
			Self::Other(code) => code,
		}
	}

	pub fn is_logged_out(self) -> bool {
		matches!(self, Self::LoggedOut)
	}
}

/// Request sent to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRequest {
	pub id: u32,
	pub method: String,
	pub params: Value,
}

/// Response to a [`DriverRequest`], correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverResponse {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<DriverErrorPayload>,
}

/// Error details returned by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverErrorPayload {
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// Connection phase carried by `connection.update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
	Connecting,
	Open,
	Close,
}

/// Unsolicited driver notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DriverEvent {
	/// Sent once after start; `registered` mirrors the stored credentials.
	#[serde(rename = "ready")]
	Ready {
		#[serde(default)]
		registered: bool,
	},
	#[serde(rename = "creds.update")]
	CredsUpdate,
	#[serde(rename = "connection.update")]
	ConnectionUpdate {
		#[serde(default)]
		connection: Option<ConnectionPhase>,
		#[serde(default, rename = "statusCode")]
		status_code: Option<u16>,
	},
}

impl DriverEvent {
	/// Maps the notification onto a lifecycle event, if it is one.
	pub fn to_link_event(&self) -> Option<LinkEvent> {
		match self {
			Self::Ready { .. } => None,
			Self::CredsUpdate => Some(LinkEvent::CredentialsUpdated),
			Self::ConnectionUpdate { connection: Some(ConnectionPhase::Open), .. } => Some(LinkEvent::ConnectionOpen),
			Self::ConnectionUpdate {
				connection: Some(ConnectionPhase::Close),
				status_code,
			} => Some(LinkEvent::ConnectionClosed(DisconnectReason::from_code(status_code.unwrap_or(428)))),
			Self::ConnectionUpdate { .. } => None,
		}
	}
}

/// Anything the driver writes to stdout.
///
/// Responses carry an `id`; events do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverMessage {
	Response(DriverResponse),
	Event(DriverEvent),
}
