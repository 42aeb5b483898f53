//! Wire and persisted types for the pairlink service.
//!
//! This crate contains the serde-serializable types shared between the
//! pairing core, the linking driver, the persisted session file and the
//! outward surfaces (chat gateway, liveness endpoint).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small constructors
//! * Stable: Changes only when a persisted or wire format changes
//!
//! Lifecycle and orchestration live in `pairlink-rs`.

pub mod ids;
pub mod link;
pub mod notice;
pub mod session;
pub mod status;

pub use ids::*;
pub use link::*;
pub use notice::*;
pub use session::*;
pub use status::*;
