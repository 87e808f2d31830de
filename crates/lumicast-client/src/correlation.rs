//! Correlation table: ackId allocation and pending-call resolution.
//!
//! Every outgoing frame embeds a fresh `ackId`; callers that wait for the
//! matching response park a one-shot slot here. The table is the only
//! structure touched by both the send path (insert) and the receive path
//! (remove/resolve), so it is a concurrent map rather than a single shared
//! pending field. This also makes concurrent in-flight correlated sends
//! safe: each response resolves exactly the waiter that caused it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

use lumicast_core::protocol::envelope::Envelope;

/// Pending-call registry keyed by `ackId`.
pub struct CorrelationTable {
    next: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Envelope>>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate the next ackId without registering a waiter
    /// (fire-and-forget sends still embed one).
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate an ackId and register a single-use waiter for it.
    pub fn register(&self) -> (u64, oneshot::Receiver<Envelope>) {
        let ack_id = self.allocate();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(ack_id, tx);
        (ack_id, rx)
    }

    /// Resolve the waiter registered under `ack_id`, if any.
    ///
    /// Returns whether a waiter existed. The entry is removed either way a
    /// waiter was found, so a duplicate response cannot resolve anything
    /// twice.
    pub fn resolve(&self, ack_id: u64, envelope: Envelope) -> bool {
        match self.pending.remove(&ack_id) {
            Some((_, tx)) => {
                // The receiver may have been dropped by a racing timeout;
                // that is equivalent to no waiter having existed.
                tx.send(envelope).is_ok()
            }
            None => false,
        }
    }

    /// Evict a timed-out entry so a late response cannot resolve an
    /// unrelated future wait.
    pub fn remove(&self, ack_id: u64) -> bool {
        self.pending.remove(&ack_id).is_some()
    }

    /// Resolve every outstanding waiter with a synthesized envelope
    /// (connection loss).
    pub fn fail_all(&self, envelope: &Envelope) {
        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(envelope.clone());
            }
        }
    }

    /// Number of outstanding waiters.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
