use std::time::Duration;

use pairlink_protocol::{DisconnectReason, LinkEvent, Notice, RequesterId, SessionId, SessionSnapshot, SessionStatus};
use pairlink_runtime::fake::{FAKE_CODE, FakeUploader};

use crate::error::PairError;
use crate::registry::ProcessState;
use crate::test_support::{Harness, UPLOAD_URL};

const REQUESTER: RequesterId = RequesterId(42);
const PHONE: &str = "+237123456789";

fn is_code(notice: &Notice) -> bool {
	matches!(notice, Notice::CodeIssued { .. })
}

fn is_terminal_notice(notice: &Notice) -> bool {
	!is_code(notice)
}

#[tokio::test]
async fn verified_pairing_records_session() {
	let mut harness = Harness::builder().build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	let issued = harness.expect_notice(REQUESTER, is_code).await;
	assert_eq!(
		issued,
		Notice::CodeIssued {
			phone_number: "237123456789".to_string(),
			code: FAKE_CODE.to_string(),
			expires_in_secs: 30,
		}
	);
	assert_eq!(record.state(), ProcessState::AwaitingLink);
	assert_eq!(harness.links.requested_numbers(0), vec!["237123456789".to_string()]);

	harness.write_credentials(0);
	assert!(harness.links.emit(0, LinkEvent::CredentialsUpdated));
	assert!(harness.links.emit(0, LinkEvent::ConnectionOpen));

	let Notice::Verified { session } = harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await else {
		unreachable!()
	};
	assert_eq!(session.session_id, SessionId::new("AbC123x1234"));
	assert_eq!(session.status, SessionStatus::Verified);
	assert_eq!(session.phone_number, "237123456789");

	let stored = harness.orchestrator.session_for(REQUESTER).unwrap();
	assert_eq!(stored, session);
	assert_eq!(record.state(), ProcessState::Verified);
	assert!(harness.orchestrator.registry().is_empty());
	assert!(!record.auth_dir().exists());
	assert_eq!(harness.links.terminate_count(0), 1);

	let uploads = harness.uploader.uploads();
	assert_eq!(uploads.len(), 1);
	assert!(uploads[0].0.ends_with(".json"));

	let written: SessionSnapshot = serde_json::from_slice(&std::fs::read(harness.orchestrator.persistence().path()).unwrap()).unwrap();
	assert_eq!(written.sessions.len(), 1);
	assert!(UPLOAD_URL.ends_with(written.sessions[0].0.as_str()));
}

#[tokio::test]
async fn second_request_while_pending_is_busy() {
	let harness = Harness::builder().code_request_delay(Duration::from_millis(200)).build();
	let first = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	let err = harness.orchestrator.begin_pairing(REQUESTER, "+237999999999").unwrap_err();
	assert!(matches!(err, PairError::Busy(r) if r == REQUESTER));
	assert_eq!(first.state(), ProcessState::PendingCode);
	assert_eq!(harness.orchestrator.registry().len(), 1);
	assert_eq!(harness.orchestrator.active_process(REQUESTER).unwrap().id(), first.id());
}

#[tokio::test]
async fn invalid_phone_allocates_nothing() {
	let harness = Harness::builder().build();
	let err = harness.orchestrator.begin_pairing(REQUESTER, "12-34").unwrap_err();
	assert!(matches!(err, PairError::Validation(_)));
	assert!(harness.orchestrator.registry().is_empty());

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(harness.links.opened(), 0);
	assert!(!harness.auth_root.exists());
}

#[tokio::test]
async fn deadline_expires_unlinked_attempt() {
	let mut harness = Harness::builder().deadline(Duration::from_millis(200)).build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;
	assert!(record.auth_dir().exists());

	harness.expect_notice(REQUESTER, |n| *n == Notice::Expired).await;
	assert_eq!(record.state(), ProcessState::Expired);
	assert!(!record.auth_dir().exists());
	assert!(harness.orchestrator.active_process(REQUESTER).is_none());
	assert_eq!(harness.links.terminate_count(0), 1);
	assert!(harness.orchestrator.session_for(REQUESTER).is_none());
}

#[tokio::test]
async fn upload_failure_substitutes_local_session_id() {
	let mut harness = Harness::builder().uploader(FakeUploader::failing()).build();
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);

	let Notice::Verified { session } = harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await else {
		unreachable!()
	};
	let id = session.session_id.as_str();
	assert_eq!(id.len(), 18, "{id}");
	assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
	assert_eq!(harness.orchestrator.session_for(REQUESTER).unwrap().session_id, session.session_id);
	assert_eq!(harness.uploader.uploads().len(), 1);
}

#[tokio::test]
async fn session_id_keeps_the_upload_file_key() {
	let mut harness = Harness::builder()
		.uploader(FakeUploader::succeeding("https://mega.nz/file/AbC123#k3yMaterial"))
		.build();
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);

	let Notice::Verified { session } = harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await else {
		unreachable!()
	};
	assert_eq!(session.session_id, SessionId::new("AbC123#k3yMaterial"));
	assert_eq!(harness.orchestrator.session_for(REQUESTER).unwrap().session_id, session.session_id);
}

#[tokio::test]
async fn issued_code_comes_from_the_link() {
	let mut harness = Harness::builder().build();
	harness.links.set_code("WXYZ-9876");
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	let Notice::CodeIssued { code, .. } = harness.expect_notice(REQUESTER, is_code).await else {
		unreachable!()
	};
	assert_eq!(code, "WXYZ-9876");
}

#[tokio::test]
async fn cancel_during_code_request_sends_no_code() {
	let mut harness = Harness::builder().build();
	harness.links.set_code_delay(Duration::from_millis(100));
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	tokio::time::sleep(Duration::from_millis(30)).await;
	assert!(harness.orchestrator.cancel(REQUESTER).await);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Cancelled).await;

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert_eq!(record.state(), ProcessState::Cancelled);
	assert_eq!(harness.links.terminate_count(0), 1);
	assert_eq!(harness.notifier.notices_for(REQUESTER), vec![Notice::Cancelled]);
}

#[tokio::test]
async fn logged_out_close_is_silent() {
	let mut harness = Harness::builder().build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	harness.links.emit(0, LinkEvent::ConnectionClosed(DisconnectReason::LoggedOut));
	harness.wait_until_idle(REQUESTER).await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert_eq!(record.state(), ProcessState::Failed);
	assert!(!record.auth_dir().exists());
	assert_eq!(harness.notifier.notices_for(REQUESTER).len(), 1);
}

#[tokio::test]
async fn other_close_reasons_suggest_retry() {
	for reason in [DisconnectReason::ConnectionLost, DisconnectReason::RestartRequired, DisconnectReason::Other(499)] {
		let mut harness = Harness::builder().build();
		let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
		harness.expect_notice(REQUESTER, is_code).await;

		harness.links.emit(0, LinkEvent::ConnectionClosed(reason));
		harness.expect_notice(REQUESTER, |n| *n == Notice::ConnectionLost).await;
		assert_eq!(record.state(), ProcessState::Failed);
		assert_eq!(harness.links.terminate_count(0), 1);
	}
}

#[tokio::test]
async fn cancel_releases_and_notifies() {
	let mut harness = Harness::builder().build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	assert!(harness.orchestrator.cancel(REQUESTER).await);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Cancelled).await;
	assert_eq!(record.state(), ProcessState::Cancelled);
	assert!(!record.auth_dir().exists());
	assert_eq!(harness.links.terminate_count(0), 1);

	assert!(!harness.orchestrator.cancel(REQUESTER).await);
	assert!(!harness.orchestrator.expire(record.id()).await);
	assert_eq!(harness.links.terminate_count(0), 1);
}

#[tokio::test]
async fn cancel_during_handshake_drops_late_connection() {
	let mut harness = Harness::builder().build();
	harness.links.set_open_delay(Duration::from_millis(100));
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	tokio::time::sleep(Duration::from_millis(30)).await;
	assert!(harness.orchestrator.cancel(REQUESTER).await);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Cancelled).await;

	tokio::time::sleep(Duration::from_millis(300)).await;
	assert_eq!(harness.links.opened(), 1);
	assert_eq!(harness.links.terminate_count(0), 1);
	assert!(harness.links.requested_numbers(0).is_empty());
	assert!(!record.auth_dir().exists());
	assert_eq!(harness.notifier.notices_for(REQUESTER), vec![Notice::Cancelled]);
}

#[tokio::test]
async fn cancel_during_code_delay_skips_code_request() {
	let mut harness = Harness::builder().code_request_delay(Duration::from_millis(100)).build();
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	tokio::time::sleep(Duration::from_millis(30)).await;
	assert!(harness.orchestrator.cancel(REQUESTER).await);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Cancelled).await;

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert!(harness.links.requested_numbers(0).is_empty());
	assert_eq!(harness.notifier.notices_for(REQUESTER), vec![Notice::Cancelled]);
}

#[tokio::test]
async fn handshake_failure_fails_attempt() {
	let mut harness = Harness::builder().build();
	harness.links.fail_open("driver exited");
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	harness.expect_notice(REQUESTER, |n| *n == Notice::Failed).await;
	assert_eq!(record.state(), ProcessState::Failed);
	assert!(!record.auth_dir().exists());
	assert!(harness.orchestrator.registry().is_empty());
}

#[tokio::test]
async fn code_request_failure_fails_attempt() {
	let mut harness = Harness::builder().build();
	harness.links.fail_code("number not on network");
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	harness.expect_notice(REQUESTER, |n| *n == Notice::Failed).await;
	assert_eq!(record.state(), ProcessState::Failed);
	assert_eq!(harness.links.terminate_count(0), 1);
	assert!(!record.auth_dir().exists());
}

#[tokio::test]
async fn open_without_credentials_fails_attempt() {
	let mut harness = Harness::builder().build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	harness.links.emit(0, LinkEvent::ConnectionOpen);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Failed).await;
	assert_eq!(record.state(), ProcessState::Failed);
	assert!(harness.orchestrator.session_for(REQUESTER).is_none());
	assert!(harness.uploader.uploads().is_empty());
}

#[tokio::test]
async fn registered_credentials_skip_code_request() {
	let mut harness = Harness::builder().build();
	harness.links.set_registered(true);
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();

	while harness.links.opened() == 0 {
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);

	harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await;
	assert!(harness.links.requested_numbers(0).is_empty());
	assert_eq!(record.state(), ProcessState::Verified);
}

#[tokio::test]
async fn completed_attempt_never_expires() {
	let mut harness = Harness::builder().deadline(Duration::from_millis(150)).build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;
	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);
	harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await;

	tokio::time::sleep(Duration::from_millis(400)).await;
	assert_eq!(record.state(), ProcessState::Verified);
	assert_eq!(harness.notifier.notices_for(REQUESTER).len(), 2);
	assert!(!harness.orchestrator.expire(record.id()).await);
	assert_eq!(harness.links.terminate_count(0), 1);
}

#[tokio::test]
async fn racing_exits_reach_one_terminal_state() {
	let mut harness = Harness::builder().build();
	let record = harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;

	let orchestrator = harness.orchestrator.clone();
	let id = record.id().clone();
	let (cancelled, expired, _) = tokio::join!(orchestrator.cancel(REQUESTER), orchestrator.expire(&id), async {
		harness.links.emit(0, LinkEvent::ConnectionClosed(DisconnectReason::ConnectionLost))
	});
	assert!(cancelled ^ expired);

	harness.wait_until_idle(REQUESTER).await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	let terminal: Vec<_> = harness.notifier.notices_for(REQUESTER).into_iter().filter(is_terminal_notice).collect();
	assert_eq!(terminal.len(), 1, "{terminal:?}");
	assert!(record.state().is_terminal());
	assert_eq!(harness.links.terminate_count(0), 1);
	assert!(!record.auth_dir().exists());
}

#[tokio::test]
async fn requester_can_pair_again_after_verification() {
	let mut harness = Harness::builder().build();
	for index in 0..2 {
		harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
		harness.expect_notice(REQUESTER, is_code).await;
		harness.write_credentials(index);
		harness.links.emit(index, LinkEvent::ConnectionOpen);
		harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await;
	}

	assert_eq!(harness.links.opened(), 2);
	assert_eq!(harness.orchestrator.store().len(), 1);
	assert!(harness.orchestrator.session_for(REQUESTER).is_some());
}

#[tokio::test]
async fn shutdown_releases_everything_silently() {
	let mut harness = Harness::builder().build();
	let first = harness.orchestrator.begin_pairing(RequesterId(1), PHONE).unwrap();
	harness.expect_notice(RequesterId(1), is_code).await;
	let second = harness.orchestrator.begin_pairing(RequesterId(2), PHONE).unwrap();
	harness.expect_notice(RequesterId(2), is_code).await;

	assert_eq!(harness.orchestrator.shutdown().await, 2);
	assert!(harness.orchestrator.registry().is_empty());
	assert_eq!(first.state(), ProcessState::Cancelled);
	assert_eq!(second.state(), ProcessState::Cancelled);
	assert!(!first.auth_dir().exists() && !second.auth_dir().exists());
	assert_eq!(harness.links.terminate_count(0) + harness.links.terminate_count(1), 2);

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(harness.notifier.sent().len(), 2);
	assert_eq!(harness.orchestrator.shutdown().await, 0);
}

#[tokio::test]
async fn delete_session_persists_removal() {
	let mut harness = Harness::builder().build();
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;
	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);
	harness.expect_notice(REQUESTER, |n| matches!(n, Notice::Verified { .. })).await;

	assert_eq!(harness.orchestrator.delete_session(REQUESTER).await, Some(SessionId::new("AbC123x1234")));
	assert_eq!(harness.orchestrator.delete_session(REQUESTER).await, None);
	assert!(harness.orchestrator.session_for(REQUESTER).is_none());

	let written: SessionSnapshot = serde_json::from_slice(&std::fs::read(harness.orchestrator.persistence().path()).unwrap()).unwrap();
	assert!(written.is_empty());
}

#[tokio::test]
async fn cancel_during_settle_discards_credentials() {
	let mut harness = Harness::builder().settle_delay(Duration::from_millis(100)).build();
	harness.orchestrator.begin_pairing(REQUESTER, PHONE).unwrap();
	harness.expect_notice(REQUESTER, is_code).await;
	harness.write_credentials(0);
	harness.links.emit(0, LinkEvent::ConnectionOpen);

	tokio::time::sleep(Duration::from_millis(30)).await;
	assert!(harness.orchestrator.cancel(REQUESTER).await);
	harness.expect_notice(REQUESTER, |n| *n == Notice::Cancelled).await;

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert!(harness.orchestrator.session_for(REQUESTER).is_none());
	assert!(harness.uploader.uploads().is_empty());
}
