//! Service shell around the pairing core: configuration, logging, the chat
//! gateway and the liveness endpoint.

pub mod cli;
pub mod gateway;
pub mod http;
pub mod logging;
