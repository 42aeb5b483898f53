//! Minimal Telegram Bot API client: long polling and plain-text replies.

use std::time::Duration;

use async_trait::async_trait;
use pairlink_protocol::{Notice, RequesterId};
use pairlink_runtime::Notifier;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::messages::render_notice;

pub const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("bot API request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("bot API rejected {method}: {description}")]
	Api { method: &'static str, description: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
	ok: bool,
	result: Option<T>,
	#[serde(default)]
	description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
	pub update_id: i64,
	#[serde(default)]
	pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
	pub chat: Chat,
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
	pub id: i64,
}

impl Update {
	/// Sender chat and text, for text messages only.
	pub fn text_message(&self) -> Option<(RequesterId, &str)> {
		let message = self.message.as_ref()?;
		Some((RequesterId(message.chat.id), message.text.as_deref()?))
	}
}

#[derive(Serialize)]
struct GetUpdates {
	offset: i64,
	timeout: u64,
	allowed_updates: &'static [&'static str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
	chat_id: i64,
	text: &'a str,
	disable_web_page_preview: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
	client: reqwest::Client,
	base: String,
}

impl TelegramClient {
	pub fn new(token: &str) -> Self {
		Self::with_base_url(reqwest::Client::new(), API_BASE, token)
	}

	pub fn with_base_url(client: reqwest::Client, api_base: &str, token: &str) -> Self {
		Self {
			client,
			base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
		}
	}

	/// Long-polls for updates with ids at or above `offset`.
	pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, GatewayError> {
		let body = GetUpdates {
			offset,
			timeout: timeout.as_secs(),
			allowed_updates: &["message"],
		};
		let updates: Option<Vec<Update>> = self.call("getUpdates", &body, timeout + Duration::from_secs(10)).await?;
		Ok(updates.unwrap_or_default())
	}

	pub async fn send_message(&self, chat: RequesterId, text: &str) -> Result<(), GatewayError> {
		let body = SendMessage {
			chat_id: chat.0,
			text,
			disable_web_page_preview: true,
		};
		let _: Option<serde_json::Value> = self.call("sendMessage", &body, Duration::from_secs(30)).await?;
		Ok(())
	}

	async fn call<B, T>(&self, method: &'static str, body: &B, timeout: Duration) -> Result<Option<T>, GatewayError>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let response: ApiResponse<T> = self
			.client
			.post(format!("{}/{method}", self.base))
			.timeout(timeout)
			.json(body)
			.send()
			.await?
			.json()
			.await?;

		if !response.ok {
			return Err(GatewayError::Api {
				method,
				description: response.description.unwrap_or_else(|| "no description".to_string()),
			});
		}
		Ok(response.result)
	}
}

/// Delivers notices as chat messages.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
	client: TelegramClient,
}

impl TelegramNotifier {
	pub fn new(client: TelegramClient) -> Self {
		Self { client }
	}
}

#[async_trait]
impl Notifier for TelegramNotifier {
	async fn notify(&self, requester: RequesterId, notice: Notice) {
		let kind = notice.kind();
		match self.client.send_message(requester, &render_notice(&notice)).await {
			Ok(()) => debug!(target = "pairlink.gateway", requester = %requester, notice = kind, "notice delivered"),
			Err(err) => warn!(target = "pairlink.gateway", requester = %requester, notice = kind, error = %err, "notice delivery failed"),
		}
	}
}
