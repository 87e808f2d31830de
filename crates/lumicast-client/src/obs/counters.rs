//! Session health counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the session receive loop and send paths.
#[derive(Debug, Default)]
pub struct ClientCounters {
    /// Inbound frames delivered by the transport.
    pub frames_rx: AtomicU64,
    /// Frames dropped because envelope or payload decoding failed.
    pub decode_errors: AtomicU64,
    /// Acks that arrived after their waiter was evicted (or never existed).
    pub stale_acks: AtomicU64,
    /// Correlated waits that hit their deadline.
    pub timeouts: AtomicU64,
    /// Outbound frames the transport refused.
    pub sends_failed: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub frames_rx: u64,
    pub decode_errors: u64,
    pub stale_acks: u64,
    pub timeouts: u64,
    pub sends_failed: u64,
}

impl ClientCounters {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames_rx: self.frames_rx.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            stale_acks: self.stale_acks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
        }
    }
}
