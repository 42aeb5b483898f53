//! Linking connection contract required by the orchestrator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pairlink_protocol::LinkEvent;
use tokio::sync::mpsc;

use crate::error::LinkError;

/// A live connection to the linking protocol, owned by one pairing attempt.
#[async_trait]
pub trait LinkConnection: Send + Sync {
	/// Asks the protocol for a linking code for `phone_number` (digits only).
	async fn request_code(&self, phone_number: &str) -> Result<String, LinkError>;

	/// Tears the connection down. Safe to call any number of times.
	async fn terminate(&self);
}

/// Opens connections whose credential material lives under `auth_dir`.
#[async_trait]
pub trait LinkConnector: Send + Sync {
	async fn open(&self, auth_dir: &Path) -> Result<OpenedLink, LinkError>;
}

/// Result of a completed connection handshake.
pub struct OpenedLink {
	pub connection: Arc<dyn LinkConnection>,
	/// Lifecycle events; closes once the connection is gone.
	pub events: mpsc::UnboundedReceiver<LinkEvent>,
	/// Whether the stored credentials are already registered (no code needed).
	pub registered: bool,
}

impl std::fmt::Debug for OpenedLink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenedLink").field("registered", &self.registered).finish_non_exhaustive()
	}
}
