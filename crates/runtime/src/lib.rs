//! Collaborator seams for the pairing core.
//!
//! The orchestrator in `pairlink-rs` talks to the outside world only through
//! the traits defined here:
//!
//! * [`LinkConnector`] / [`LinkConnection`] - the account-linking protocol,
//!   implemented for real by [`driver::DriverConnector`] (a JSON-lines
//!   subprocess)
//! * [`BlobUploader`] - off-box backup of credential material
//! * [`Notifier`] - outbound notices to the requester
//! * [`credentials`] - the per-attempt credential directory
//!
//! [`fake`] provides in-memory doubles for all of them.

pub mod connection;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod fake;
pub mod notify;
pub mod upload;

pub use connection::{LinkConnection, LinkConnector, OpenedLink};
pub use error::{LinkError, UploadError};
pub use notify::Notifier;
pub use upload::{BlobUploader, DisabledUploader, HttpUploader};
