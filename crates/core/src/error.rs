use pairlink_protocol::RequesterId;
use pairlink_runtime::LinkError;
use thiserror::Error;

use crate::registry::Busy;

/// Errors raised while pairing, configuring or persisting.
///
/// None of these reach the requester verbatim; the orchestrator maps them to
/// a terminal state and a short notice, and logs the detail.
#[derive(Debug, Error)]
pub enum PairError {
	#[error("a pairing process is already running for requester {0}")]
	Busy(RequesterId),

	#[error("invalid phone number: {0}")]
	Validation(String),

	#[error("linking protocol error: {0}")]
	Protocol(#[from] LinkError),

	#[error("pairing deadline exceeded")]
	Timeout,

	#[error("internal error: {0}")]
	Internal(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl From<Busy> for PairError {
	fn from(busy: Busy) -> Self {
		Self::Busy(busy.0)
	}
}

pub type Result<T> = std::result::Result<T, PairError>;
