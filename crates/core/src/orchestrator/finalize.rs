//! Success path: credentials to session.

use pairlink_protocol::{Notice, ProcessId, Session, SessionId};
use pairlink_runtime::UploadError;
use pairlink_runtime::credentials::read_credentials;
use pairlink_runtime::upload::session_id_from_url;
use tracing::{info, warn};

use super::Orchestrator;
use crate::clock::now_ts;
use crate::error::{PairError, Result};
use crate::idgen::{fallback_session_id, upload_name};
use crate::registry::{ProcessRecord, ProcessState};

/// Outcome of backing up the credential file.
///
/// Upload failure is not a pairing failure: a locally generated id stands in.
#[derive(Debug)]
pub(super) enum Externalized {
	Uploaded { session_id: SessionId, url: String },
	Substituted { session_id: SessionId, error: UploadError },
}

impl Externalized {
	pub(super) fn into_session_id(self) -> SessionId {
		match self {
			Self::Uploaded { session_id, .. } | Self::Substituted { session_id, .. } => session_id,
		}
	}
}

impl Orchestrator {
	/// Handles `connection open`: the account is linked, record the session.
	pub(super) async fn complete(&self, id: &ProcessId) {
		let Some(record) = self.inner.registry.get(id) else {
			return;
		};

		let session = match self.collect(&record).await {
			Ok(Some(session)) => session,
			Ok(None) => return,
			Err(err) => return self.fail(id, err).await,
		};

		if self.finish(id, ProcessState::Verified, None).await.is_none() {
			return;
		}

		let superseded = self.store().put(session.clone());
		info!(
			target = "pairlink.orchestrator",
			process = %id,
			requester = %session.requester_id,
			session = %session.session_id,
			superseded = ?superseded.as_ref().map(SessionId::as_str),
			"session recorded"
		);
		if let Err(err) = self.inner.persistence.flush().await {
			warn!(target = "pairlink.orchestrator", error = %err, "flush after pairing failed; session kept in memory");
		}
		self.notify(session.requester_id, Notice::Verified { session }).await;
	}

	/// Reads and externalizes the credentials. `None` means the attempt ended meanwhile.
	async fn collect(&self, record: &ProcessRecord) -> Result<Option<Session>> {
		let settle = self.inner.settings.settle_delay;
		if !settle.is_zero() {
			tokio::time::sleep(settle).await;
			if !self.is_live(record) {
				return Ok(None);
			}
		}

		let credentials = read_credentials(record.auth_dir())
			.await?
			.ok_or_else(|| PairError::Internal(format!("link opened but no credentials in {}", record.auth_dir().display())))?;
		if !self.is_live(record) {
			return Ok(None);
		}

		let session_id = self.externalize(record, credentials).await.into_session_id();
		if !self.is_live(record) {
			return Ok(None);
		}

		Ok(Some(Session::verified(session_id, record.requester(), record.phone().as_str(), now_ts())))
	}

	pub(super) async fn externalize(&self, record: &ProcessRecord, credentials: Vec<u8>) -> Externalized {
		let name = upload_name();
		let outcome = match self.inner.uploader.upload(credentials, &name).await {
			Ok(url) => match session_id_from_url(&url) {
				Some(id) => Externalized::Uploaded {
					session_id: SessionId::new(id),
					url,
				},
				None => Externalized::Substituted {
					session_id: fallback_session_id(),
					error: UploadError::EmptyUrl,
				},
			},
			Err(error) => Externalized::Substituted {
				session_id: fallback_session_id(),
				error,
			},
		};

		match &outcome {
			Externalized::Uploaded { session_id, url } => {
				info!(target = "pairlink.orchestrator", process = %record.id(), session = %session_id, %url, "credentials uploaded");
			}
			Externalized::Substituted { session_id, error } => {
				warn!(target = "pairlink.orchestrator", process = %record.id(), session = %session_id, error = %error, "credential upload failed; using local session id");
			}
		}
		outcome
	}
}
