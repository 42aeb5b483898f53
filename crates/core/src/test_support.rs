//! Orchestrator wired to in-memory collaborators and a temp directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pairlink_protocol::{Notice, RequesterId};
use pairlink_runtime::credentials::CREDENTIALS_FILE;
use pairlink_runtime::fake::{FakeConnector, FakeLinkController, FakeUploader, RecordingNotifier};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::config::PairingSettings;
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::persist::SessionPersistence;
use crate::registry::ProcessRegistry;
use crate::store::SessionStore;

pub(crate) const UPLOAD_URL: &str = "https://blobs.example/files/AbC123x1234";
const NOTICE_WAIT: Duration = Duration::from_secs(5);

pub(crate) struct HarnessBuilder {
	deadline: Duration,
	code_request_delay: Duration,
	settle_delay: Duration,
	uploader: FakeUploader,
}

impl HarnessBuilder {
	pub(crate) fn deadline(mut self, deadline: Duration) -> Self {
		self.deadline = deadline;
		self
	}

	pub(crate) fn code_request_delay(mut self, delay: Duration) -> Self {
		self.code_request_delay = delay;
		self
	}

	pub(crate) fn settle_delay(mut self, delay: Duration) -> Self {
		self.settle_delay = delay;
		self
	}

	pub(crate) fn uploader(mut self, uploader: FakeUploader) -> Self {
		self.uploader = uploader;
		self
	}

	pub(crate) fn build(self) -> Harness {
		let temp = TempDir::new().unwrap();
		let auth_root = temp.path().join("auth");
		let state_dir = temp.path().join("state");

		let (connector, links) = FakeConnector::build();
		let (notifier, notices) = RecordingNotifier::new();
		let uploader = Arc::new(self.uploader);
		let notifier = Arc::new(notifier);

		let persistence = Arc::new(SessionPersistence::new(Arc::new(SessionStore::new()), &state_dir));
		let settings = PairingSettings {
			auth_root: auth_root.clone(),
			deadline: self.deadline,
			code_request_delay: self.code_request_delay,
			settle_delay: self.settle_delay,
		};
		let orchestrator = Orchestrator::new(
			settings,
			Arc::new(ProcessRegistry::new()),
			persistence,
			Collaborators {
				connector: Arc::new(connector),
				uploader: uploader.clone(),
				notifier: notifier.clone(),
			},
		);

		Harness {
			orchestrator,
			links,
			uploader,
			notifier,
			notices,
			auth_root,
			_temp: temp,
		}
	}
}

pub(crate) struct Harness {
	pub(crate) orchestrator: Orchestrator,
	pub(crate) links: FakeLinkController,
	pub(crate) uploader: Arc<FakeUploader>,
	pub(crate) notifier: Arc<RecordingNotifier>,
	notices: mpsc::UnboundedReceiver<(RequesterId, Notice)>,
	pub(crate) auth_root: PathBuf,
	_temp: TempDir,
}

impl Harness {
	/// Long deadline, no delays, uploads succeed with [`UPLOAD_URL`].
	pub(crate) fn builder() -> HarnessBuilder {
		HarnessBuilder {
			deadline: Duration::from_secs(30),
			code_request_delay: Duration::ZERO,
			settle_delay: Duration::ZERO,
			uploader: FakeUploader::succeeding(UPLOAD_URL),
		}
	}

	/// Waits for the next notice addressed to `requester` and checks it against `expected`.
	pub(crate) async fn expect_notice(&mut self, requester: RequesterId, expected: impl Fn(&Notice) -> bool) -> Notice {
		let notice = tokio::time::timeout(NOTICE_WAIT, async {
			loop {
				match self.notices.recv().await {
					Some((to, notice)) if to == requester => return notice,
					Some(_) => continue,
					None => panic!("notifier dropped"),
				}
			}
		})
		.await
		.unwrap_or_else(|_| panic!("no notice for {requester} within {NOTICE_WAIT:?}"));
		assert!(expected(&notice), "unexpected notice for {requester}: {notice:?}");
		notice
	}

	/// Polls until the requester has no attempt in flight.
	pub(crate) async fn wait_until_idle(&self, requester: RequesterId) {
		tokio::time::timeout(NOTICE_WAIT, async {
			while self.orchestrator.active_process(requester).is_some() {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap_or_else(|_| panic!("requester {requester} still has a pairing in flight"));
	}

	/// Writes a credential file where connection `index` keeps its auth material.
	pub(crate) fn write_credentials(&self, index: usize) {
		let dir = self.links.auth_dir(index).expect("connection not opened");
		std::fs::write(dir.join(CREDENTIALS_FILE), br#"{"me":{"id":"237123456789@s.whatsapp.net"}}"#).unwrap();
	}
}
