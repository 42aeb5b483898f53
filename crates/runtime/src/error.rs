use thiserror::Error;

/// Failure talking to the linking protocol.
#[derive(Debug, Error)]
pub enum LinkError {
	#[error("failed to start linking driver: {0}")]
	Spawn(#[source] std::io::Error),

	#[error("linking handshake failed: {0}")]
	Handshake(String),

	#[error("linking request {method} failed: {message}")]
	Request { method: String, message: String },

	#[error("phone number rejected by linking protocol: {0}")]
	InvalidNumber(String),

	#[error("linking connection closed")]
	Closed,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Failure externalizing credential material.
#[derive(Debug, Error)]
pub enum UploadError {
	#[error("uploads are disabled")]
	Disabled,

	#[error("upload request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("upload rejected with status {0}")]
	Status(u16),

	#[error("upload response did not contain a usable URL")]
	EmptyUrl,
}
