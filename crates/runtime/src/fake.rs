//! In-memory collaborators for exercising the pairing core without a driver,
//! an upload service or a chat.
//!
//! # Example
//!
//! ```ignore
//! let (connector, links) = FakeConnector::build();
//! // hand `connector` to the orchestrator and begin a pairing, then:
//! links.emit(0, LinkEvent::ConnectionOpen);
//! assert_eq!(links.terminate_count(0), 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pairlink_protocol::{LinkEvent, Notice, RequesterId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::{LinkConnection, LinkConnector, OpenedLink};
use crate::error::{LinkError, UploadError};
use crate::notify::Notifier;
use crate::upload::BlobUploader;

/// Default code handed out by [`FakeConnector`].
pub const FAKE_CODE: &str = "ABCD-1234";

#[derive(Debug, Clone)]
struct FakeScript {
	registered: bool,
	code: String,
	code_error: Option<String>,
	open_error: Option<String>,
	open_delay: Duration,
	code_delay: Duration,
}

impl Default for FakeScript {
	fn default() -> Self {
		Self {
			registered: false,
			code: FAKE_CODE.to_string(),
			code_error: None,
			open_error: None,
			open_delay: Duration::ZERO,
			code_delay: Duration::ZERO,
		}
	}
}

struct FakeLinkState {
	auth_dir: PathBuf,
	events: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
	terminations: AtomicUsize,
	requested: Mutex<Vec<String>>,
}

#[derive(Default)]
struct FakeShared {
	script: Mutex<FakeScript>,
	links: Mutex<Vec<Arc<FakeLinkState>>>,
}

/// Connector whose connections are scripted through a [`FakeLinkController`].
pub struct FakeConnector {
	shared: Arc<FakeShared>,
}

impl FakeConnector {
	/// Builds the connector and the controller that drives its connections.
	pub fn build() -> (Self, FakeLinkController) {
		let shared = Arc::new(FakeShared::default());
		(
			Self { shared: Arc::clone(&shared) },
			FakeLinkController { shared },
		)
	}
}

#[async_trait]
impl LinkConnector for FakeConnector {
	async fn open(&self, auth_dir: &Path) -> Result<OpenedLink, LinkError> {
		let script = self.shared.script.lock().clone();
		if !script.open_delay.is_zero() {
			tokio::time::sleep(script.open_delay).await;
		}
		if let Some(message) = script.open_error.clone() {
			return Err(LinkError::Handshake(message));
		}

		let (tx, events) = mpsc::unbounded_channel();
		let state = Arc::new(FakeLinkState {
			auth_dir: auth_dir.to_path_buf(),
			events: Mutex::new(Some(tx)),
			terminations: AtomicUsize::new(0),
			requested: Mutex::new(Vec::new()),
		});
		self.shared.links.lock().push(Arc::clone(&state));

		Ok(OpenedLink {
			connection: Arc::new(FakeConnection {
				state,
				script: script.clone(),
			}),
			events,
			registered: script.registered,
		})
	}
}

struct FakeConnection {
	state: Arc<FakeLinkState>,
	script: FakeScript,
}

#[async_trait]
impl LinkConnection for FakeConnection {
	async fn request_code(&self, phone_number: &str) -> Result<String, LinkError> {
		if !self.script.code_delay.is_zero() {
			tokio::time::sleep(self.script.code_delay).await;
		}
		self.state.requested.lock().push(phone_number.to_string());
		if self.state.terminations.load(Ordering::SeqCst) > 0 {
			return Err(LinkError::Closed);
		}
		match &self.script.code_error {
			Some(message) => Err(LinkError::Request {
				method: "requestPairingCode".to_string(),
				message: message.clone(),
			}),
			None => Ok(self.script.code.clone()),
		}
	}

	async fn terminate(&self) {
		self.state.terminations.fetch_add(1, Ordering::SeqCst);
		self.state.events.lock().take();
	}
}

/// Scripts and inspects connections opened by a [`FakeConnector`].
///
/// Script changes apply to connections opened afterwards. Connections are
/// indexed in the order they were opened.
pub struct FakeLinkController {
	shared: Arc<FakeShared>,
}

impl FakeLinkController {
	pub fn set_registered(&self, registered: bool) {
		self.shared.script.lock().registered = registered;
	}

	pub fn set_code(&self, code: &str) {
		self.shared.script.lock().code = code.to_string();
	}

	pub fn fail_code(&self, message: &str) {
		self.shared.script.lock().code_error = Some(message.to_string());
	}

	pub fn fail_open(&self, message: &str) {
		self.shared.script.lock().open_error = Some(message.to_string());
	}

	pub fn set_open_delay(&self, delay: Duration) {
		self.shared.script.lock().open_delay = delay;
	}

	pub fn set_code_delay(&self, delay: Duration) {
		self.shared.script.lock().code_delay = delay;
	}

	/// Number of connections opened so far.
	pub fn opened(&self) -> usize {
		self.shared.links.lock().len()
	}

	/// Delivers `event` on connection `index`. Returns `false` once it was terminated.
	pub fn emit(&self, index: usize, event: LinkEvent) -> bool {
		let Some(link) = self.link(index) else {
			return false;
		};
		let events = link.events.lock();
		events.as_ref().is_some_and(|tx| tx.send(event).is_ok())
	}

	pub fn terminate_count(&self, index: usize) -> usize {
		self.link(index).map_or(0, |link| link.terminations.load(Ordering::SeqCst))
	}

	pub fn auth_dir(&self, index: usize) -> Option<PathBuf> {
		self.link(index).map(|link| link.auth_dir.clone())
	}

	pub fn requested_numbers(&self, index: usize) -> Vec<String> {
		self.link(index).map(|link| link.requested.lock().clone()).unwrap_or_default()
	}

	fn link(&self, index: usize) -> Option<Arc<FakeLinkState>> {
		self.shared.links.lock().get(index).cloned()
	}
}

/// Uploader that either always succeeds with a fixed URL or always fails.
pub struct FakeUploader {
	url: Option<String>,
	uploads: Mutex<Vec<(String, usize)>>,
}

impl FakeUploader {
	pub fn succeeding(url: &str) -> Self {
		Self {
			url: Some(url.to_string()),
			uploads: Mutex::new(Vec::new()),
		}
	}

	pub fn failing() -> Self {
		Self {
			url: None,
			uploads: Mutex::new(Vec::new()),
		}
	}

	/// `(suggested_name, payload_len)` of every attempted upload.
	pub fn uploads(&self) -> Vec<(String, usize)> {
		self.uploads.lock().clone()
	}
}

#[async_trait]
impl BlobUploader for FakeUploader {
	async fn upload(&self, payload: Vec<u8>, suggested_name: &str) -> Result<String, UploadError> {
		self.uploads.lock().push((suggested_name.to_string(), payload.len()));
		self.url.clone().ok_or(UploadError::Status(503))
	}
}

/// Notifier that records every notice and mirrors it onto a channel.
pub struct RecordingNotifier {
	sent: Mutex<Vec<(RequesterId, Notice)>>,
	tx: mpsc::UnboundedSender<(RequesterId, Notice)>,
}

impl RecordingNotifier {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<(RequesterId, Notice)>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(
			Self {
				sent: Mutex::new(Vec::new()),
				tx,
			},
			rx,
		)
	}

	pub fn sent(&self) -> Vec<(RequesterId, Notice)> {
		self.sent.lock().clone()
	}

	pub fn notices_for(&self, requester: RequesterId) -> Vec<Notice> {
		self.sent
			.lock()
			.iter()
			.filter(|(to, _)| *to == requester)
			.map(|(_, notice)| notice.clone())
			.collect()
	}
}

#[async_trait]
impl Notifier for RecordingNotifier {
	async fn notify(&self, requester: RequesterId, notice: Notice) {
		self.sent.lock().push((requester, notice.clone()));
		let _ = self.tx.send((requester, notice));
	}
}
