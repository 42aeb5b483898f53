//! Connection setup and link event dispatch.

use std::sync::Arc;

use pairlink_protocol::{DisconnectReason, LinkEvent, Notice, ProcessId};
use pairlink_runtime::credentials::{create_auth_dir, remove_auth_dir};
use pairlink_runtime::{LinkError, OpenedLink};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::Orchestrator;
use crate::error::{PairError, Result};
use crate::registry::{ProcessRecord, ProcessState};

impl Orchestrator {
	/// Background half of [`begin_pairing`](Orchestrator::begin_pairing).
	pub(super) async fn drive(self, record: Arc<ProcessRecord>) {
		if let Err(err) = self.setup(&record).await {
			self.fail(record.id(), err).await;
		}
	}

	async fn setup(&self, record: &Arc<ProcessRecord>) -> Result<()> {
		create_auth_dir(record.auth_dir()).await?;
		if !self.is_live(record) {
			// Ended while the directory was being created; its release already ran.
			remove_auth_dir(record.auth_dir()).await?;
			return Ok(());
		}

		let OpenedLink {
			connection,
			events,
			registered,
		} = self.inner.connector.open(record.auth_dir()).await?;
		if let Err(connection) = record.attach_connection(Arc::clone(&connection)) {
			debug!(target = "pairlink.orchestrator", process = %record.id(), "pairing ended during handshake; dropping connection");
			connection.terminate().await;
			return Ok(());
		}
		tokio::spawn(self.clone().pump(record.id().clone(), events));

		if registered {
			debug!(target = "pairlink.orchestrator", process = %record.id(), "credentials already registered; awaiting link");
			return Ok(());
		}

		let delay = self.inner.settings.code_request_delay;
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
			if !self.is_live(record) {
				return Ok(());
			}
		}

		let code = connection.request_code(record.phone().as_str()).await?;
		if !self.is_live(record) || !record.advance(ProcessState::AwaitingLink) {
			return Ok(());
		}

		info!(target = "pairlink.orchestrator", process = %record.id(), "linking code issued");
		self.notify(
			record.requester(),
			Notice::CodeIssued {
				phone_number: record.phone().as_str().to_string(),
				code,
				expires_in_secs: self.inner.settings.deadline.as_secs(),
			},
		)
		.await;
		Ok(())
	}

	/// Feeds link events into the state machine until the attempt ends or the link goes away.
	async fn pump(self, id: ProcessId, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
		while let Some(event) = events.recv().await {
			if !self.inner.registry.contains(&id) {
				break;
			}
			self.handle_event(&id, event).await;
		}
		debug!(target = "pairlink.orchestrator", process = %id, "link event stream ended");
	}

	async fn handle_event(&self, id: &ProcessId, event: LinkEvent) {
		match event {
			LinkEvent::CredentialsUpdated => {
				debug!(target = "pairlink.orchestrator", process = %id, "credentials updated");
			}
			LinkEvent::ConnectionOpen => self.complete(id).await,
			LinkEvent::ConnectionClosed(reason) => self.closed(id, reason).await,
		}
	}

	/// A logged-out close ends the attempt silently; any other close suggests a retry.
	async fn closed(&self, id: &ProcessId, reason: DisconnectReason) {
		let cause = PairError::Protocol(LinkError::Closed);
		debug!(target = "pairlink.orchestrator", process = %id, reason = ?reason, code = reason.code(), "link closed");
		let Some(record) = self.finish(id, ProcessState::Failed, Some(&cause)).await else {
			return;
		};
		if !reason.is_logged_out() {
			self.notify(record.requester(), Notice::ConnectionLost).await;
		}
	}
}
