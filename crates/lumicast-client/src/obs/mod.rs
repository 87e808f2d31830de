//! Lightweight in-process counters (dependency-free).
//!
//! The client exposes minimal health counters without adding external
//! crates. Counters are stored as atomics and read via `snapshot()`.

pub mod counters;

pub use counters::{ClientCounters, CounterSnapshot};
