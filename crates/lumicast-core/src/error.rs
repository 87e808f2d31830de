//! Shared error type across lumicast crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, LumicastError>;

/// Unified error type used by the protocol core and the client runtime.
#[derive(Debug, Error)]
pub enum LumicastError {
    /// A frame whose `type` value is not one the protocol knows.
    #[error("unknown envelope type: {0}")]
    UnknownEnvelopeType(String),

    /// A frame that is not valid JSON or is missing required structure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A known field carried a JSON token of the wrong kind.
    ///
    /// Unknown field names are never reported this way; they are tolerated
    /// so the payload schema can evolve ahead of the client.
    #[error("decode error: field `{field}` expected {expected}, found {found}")]
    Decode {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    /// Socket open/send/close failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A correlated wait exceeded its deadline.
    #[error("timed out waiting for broker response")]
    Timeout,

    /// The session lost its connection while an operation was in flight.
    #[error("disconnected from broker")]
    Disconnected,

    /// An operation was attempted in a session state that does not allow it.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// Configuration failed to parse or validate.
    #[error("config error: {0}")]
    Config(String),

    /// Access negotiation with the upstream capability failed.
    #[error("negotiate failed: {0}")]
    Negotiate(String),
}

impl LumicastError {
    /// Whether this error means the frame should be dropped but the session
    /// kept alive (protocol-level) rather than torn down (transport-level).
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            LumicastError::UnknownEnvelopeType(_)
                | LumicastError::Protocol(_)
                | LumicastError::Decode { .. }
        )
    }
}
