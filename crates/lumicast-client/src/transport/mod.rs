//! Byte-oriented transport seam.
//!
//! The session owns exactly one connection and talks to it through
//! channels, so tests can inject a channel-backed fake instead of a
//! socket. Closing the outbound sender is the graceful/forced close signal:
//! the production writer task sends a WebSocket Close frame and shuts the
//! socket down when the channel drains.

pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use lumicast_core::Result;

/// Inbound notification from the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete text frame.
    Text(String),
    /// The connection is gone (remote close or transport error).
    Closed,
}

/// One open duplex connection.
///
/// `tx` carries outbound text frames; dropping it closes the connection.
/// `events` delivers inbound frames in transport order, terminated by
/// [`TransportEvent::Closed`].
pub struct TransportConn {
    pub tx: mpsc::Sender<String>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Connection factory injected into the session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`.
    async fn open(&self, url: &str) -> Result<TransportConn>;
}
