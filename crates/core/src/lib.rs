//! Pairing-process orchestrator.
//!
//! Tracks at most one in-flight linking attempt per requester, bounds its
//! lifetime, reclaims its resources on every exit path and records verified
//! results in a durable session store.
//!
//! * [`SessionStore`] - completed pairings, keyed by session and by requester
//! * [`ProcessRegistry`] - in-flight attempts; enforces one per requester
//! * [`Orchestrator`] - drives an attempt from creation to a terminal state
//! * [`Sweeper`] - periodic reclamation of attempts whose deadline never fired
//! * [`SessionPersistence`] - snapshot restore and periodic/shutdown flushes

pub mod clock;
pub mod config;
pub mod error;
pub mod idgen;
pub mod orchestrator;
pub mod persist;
pub mod phone;
pub mod registry;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{PairingSettings, ServiceConfig};
pub use error::{PairError, Result};
pub use orchestrator::{Collaborators, Orchestrator};
pub use persist::SessionPersistence;
pub use phone::PhoneNumber;
pub use registry::{Busy, ProcessRecord, ProcessRegistry, ProcessState};
pub use store::SessionStore;
pub use sweeper::Sweeper;
