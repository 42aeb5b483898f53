//! Maps chat commands onto orchestrator calls.

use pairlink::{Orchestrator, PairError};
use pairlink_protocol::RequesterId;
use tracing::{debug, warn};

use super::commands::GatewayCommand;
use super::messages;

#[derive(Debug, Clone)]
pub struct Dispatcher {
	orchestrator: Orchestrator,
}

impl Dispatcher {
	pub fn new(orchestrator: Orchestrator) -> Self {
		Self { orchestrator }
	}

	/// Runs `command` for `chat` and returns the immediate reply, if any.
	///
	/// Outcomes that arrive later (codes, expiry, completion, cancellation)
	/// reach the chat through the orchestrator's notifier instead.
	pub async fn respond(&self, chat: RequesterId, command: GatewayCommand) -> Option<String> {
		debug!(target = "pairlink.gateway", requester = %chat, command = ?command, "command received");
		let reply = match command {
			GatewayCommand::Start | GatewayCommand::Help => messages::WELCOME.to_string(),
			GatewayCommand::PairUsage => messages::PAIR_USAGE.to_string(),
			GatewayCommand::Pair(raw) => match self.orchestrator.begin_pairing(chat, &raw) {
				Ok(record) => messages::pairing_started(record.phone().as_str()),
				Err(PairError::Busy(_)) => messages::BUSY.to_string(),
				Err(PairError::Validation(reason)) => {
					debug!(target = "pairlink.gateway", requester = %chat, reason = %reason, "rejected phone number");
					messages::INVALID_NUMBER.to_string()
				}
				Err(err) => {
					warn!(target = "pairlink.gateway", requester = %chat, error = %err, "failed to start pairing");
					messages::START_FAILED.to_string()
				}
			},
			GatewayCommand::Cancel => {
				if self.orchestrator.cancel(chat).await {
					return None;
				}
				messages::NOTHING_TO_CANCEL.to_string()
			}
			GatewayCommand::DeleteSession => match self.orchestrator.delete_session(chat).await {
				Some(id) => messages::session_deleted(&id),
				None => messages::NO_SESSION.to_string(),
			},
			GatewayCommand::ListSession => match self.orchestrator.session_for(chat) {
				Some(session) => messages::session_listing(&session),
				None => messages::NO_SESSION.to_string(),
			},
			GatewayCommand::Status => messages::service_status(
				self.orchestrator.store().len(),
				self.orchestrator.registry().len(),
				self.orchestrator.active_process(chat).as_deref(),
			),
		};
		Some(reply)
	}
}
