//! lumicast core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire-level contracts shared by the client runtime
//! and tooling: the broker envelope codec, the outbound frame builders, and
//! the LED command-batch decoder. It intentionally carries no transport or
//! runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `LumicastError`/`Result` so a session
//! never crashes on malformed broker traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{LumicastError, Result};
