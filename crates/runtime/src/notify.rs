use async_trait::async_trait;
use pairlink_protocol::{Notice, RequesterId};

/// Outbound channel to the requester.
///
/// Delivery is best effort: implementations log failures instead of
/// returning them, so a dead chat never blocks resource reclamation.
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn notify(&self, requester: RequesterId, notice: Notice);
}
