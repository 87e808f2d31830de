//! lumicast client library entry.
//!
//! This crate wires the transport, correlation table, and group session
//! into a usable broker client. It is intended to be consumed by the
//! console binary (`main.rs`), by kiosk hosts, and by integration tests.

pub mod config;
pub mod correlation;
pub mod negotiate;
pub mod obs;
pub mod session;
pub mod transport;

pub use session::{GroupSession, SessionState};
