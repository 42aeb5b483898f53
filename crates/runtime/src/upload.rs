//! Off-box backup of credential material.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::error::UploadError;

/// Per-request limit for [`HttpUploader`].
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Stores a credential file somewhere durable and returns its URL.
#[async_trait]
pub trait BlobUploader: Send + Sync {
	async fn upload(&self, payload: Vec<u8>, suggested_name: &str) -> Result<String, UploadError>;
}

/// Uploader used when no endpoint is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledUploader;

#[async_trait]
impl BlobUploader for DisabledUploader {
	async fn upload(&self, _payload: Vec<u8>, _suggested_name: &str) -> Result<String, UploadError> {
		Err(UploadError::Disabled)
	}
}

/// POSTs the payload to an HTTP endpoint.
///
/// The request carries the suggested file name as the `name` query
/// parameter. The response body is either a bare URL or a JSON object with a
/// `url` field.
#[derive(Debug, Clone)]
pub struct HttpUploader {
	client: reqwest::Client,
	endpoint: String,
	timeout: Duration,
}

impl HttpUploader {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self::with_client(reqwest::Client::new(), endpoint)
	}

	pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
		Self {
			client,
			endpoint: endpoint.into(),
			timeout: UPLOAD_TIMEOUT,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}
}

#[async_trait]
impl BlobUploader for HttpUploader {
	async fn upload(&self, payload: Vec<u8>, suggested_name: &str) -> Result<String, UploadError> {
		let response = self
			.client
			.post(&self.endpoint)
			.query(&[("name", suggested_name)])
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.body(payload)
			.timeout(self.timeout)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(UploadError::Status(status.as_u16()));
		}

		let body = response.text().await?;
		let url = url_from_body(&body).ok_or(UploadError::EmptyUrl)?;
		debug!(target = "pairlink.upload", name = suggested_name, %url, "credential file uploaded");
		Ok(url)
	}
}

fn url_from_body(body: &str) -> Option<String> {
	let body = body.trim();
	let url = match serde_json::from_str::<Value>(body) {
		Ok(Value::Object(map)) => map.get("url").and_then(Value::as_str).map(str::to_string)?,
		_ => body.to_string(),
	};
	(!url.is_empty()).then_some(url)
}

/// Extracts the session identifier from an upload URL.
///
/// The id is the last non-empty path segment, followed by `#fragment` when the
/// URL has one. Blob hosts such as MEGA carry the file key in the fragment, so
/// dropping it would make the stored file unrecoverable.
pub fn session_id_from_url(url: &str) -> Option<String> {
	let parsed = Url::parse(url).ok()?;
	let segment = parsed.path_segments()?.filter(|segment| !segment.is_empty()).last()?;
	match parsed.fragment().filter(|fragment| !fragment.is_empty()) {
		Some(fragment) => Some(format!("{segment}#{fragment}")),
		None => Some(segment.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_id_is_last_path_segment() {
		assert_eq!(session_id_from_url("https://blobs.example/files/AbC123x1234").as_deref(), Some("AbC123x1234"));
		assert_eq!(session_id_from_url("https://blobs.example/v1/xyz/").as_deref(), Some("xyz"));
		assert_eq!(session_id_from_url("https://blobs.example/"), None);
		assert_eq!(session_id_from_url("not a url"), None);
	}

	#[test]
	fn session_id_keeps_the_file_key_fragment() {
		let url = "https://mega.nz/file/AbC123#k3yMaterial";
		assert_eq!(session_id_from_url(url), Some(url.replace("https://mega.nz/file/", "")));
		assert_eq!(session_id_from_url("https://mega.nz/file/AbC123#").as_deref(), Some("AbC123"));
	}

	#[test]
	fn response_body_may_be_bare_or_json() {
		assert_eq!(url_from_body(" https://b.example/f/1 \n").as_deref(), Some("https://b.example/f/1"));
		assert_eq!(url_from_body(r#"{"url": "https://b.example/f/2"}"#).as_deref(), Some("https://b.example/f/2"));
		assert_eq!(url_from_body(r#"{"ok": true}"#), None);
		assert_eq!(url_from_body("   "), None);
	}

	#[tokio::test]
	async fn hung_endpoint_times_out() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let server = tokio::spawn(async move {
			// Accept and never answer.
			let (socket, _) = listener.accept().await.unwrap();
			tokio::time::sleep(Duration::from_secs(30)).await;
			drop(socket);
		});

		let uploader = HttpUploader::new(format!("http://{addr}/upload")).with_timeout(Duration::from_millis(200));
		let err = tokio::time::timeout(Duration::from_secs(5), uploader.upload(b"{}".to_vec(), "a.json"))
			.await
			.expect("upload outlived its timeout")
			.unwrap_err();
		assert!(matches!(&err, UploadError::Http(inner) if inner.is_timeout()), "{err}");
		server.abort();
	}

	#[tokio::test]
	async fn disabled_uploader_always_fails() {
		let err = DisabledUploader.upload(b"{}".to_vec(), "a.json").await.unwrap_err();
		assert!(matches!(err, UploadError::Disabled));
	}
}
