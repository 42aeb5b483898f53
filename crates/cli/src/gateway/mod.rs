//! Chat gateway: Telegram long polling in, notices and replies out.

pub mod commands;
pub mod dispatch;
pub mod messages;
pub mod telegram;

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use commands::GatewayCommand;
pub use dispatch::Dispatcher;
pub use telegram::{GatewayError, TelegramClient, TelegramNotifier};

const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Polls for commands and answers them until `shutdown` changes.
///
/// Commands are handled one at a time in arrival order. Poll failures are
/// logged and retried after a short pause.
pub async fn run_polling(client: TelegramClient, dispatcher: Dispatcher, poll_timeout: Duration, mut shutdown: watch::Receiver<bool>) {
	let mut offset = 0;
	info!(target = "pairlink.gateway", "chat polling started");

	loop {
		let updates = tokio::select! {
			result = client.get_updates(offset, poll_timeout) => result,
			_ = shutdown.changed() => break,
		};

		let updates = match updates {
			Ok(updates) => updates,
			Err(err) => {
				warn!(target = "pairlink.gateway", error = %err, "polling failed; retrying");
				tokio::select! {
					_ = tokio::time::sleep(RETRY_BACKOFF) => continue,
					_ = shutdown.changed() => break,
				}
			}
		};

		for update in updates {
			offset = offset.max(update.update_id + 1);
			let Some((chat, text)) = update.text_message() else {
				continue;
			};
			let Some(command) = GatewayCommand::parse(text) else {
				debug!(target = "pairlink.gateway", requester = %chat, "ignoring non-command message");
				continue;
			};
			let Some(reply) = dispatcher.respond(chat, command).await else {
				continue;
			};
			if let Err(err) = client.send_message(chat, &reply).await {
				warn!(target = "pairlink.gateway", requester = %chat, error = %err, "reply delivery failed");
			}
		}
	}

	info!(target = "pairlink.gateway", "chat polling stopped");
}
