//! Broker envelope codec (JSON).
//!
//! Inbound frames are classified by the *value* of their `type` field, read
//! through a minimal header struct before the full decode. Key ordering in
//! the frame therefore does not matter. The group payload is kept as
//! `RawValue` so the command decoder can run as a lazy second pass.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{LumicastError, Result};

/// Reason string carried by a locally synthesized timeout envelope.
pub const REASON_TIMEOUT: &str = "timeout";
/// Reason string carried by a locally synthesized disconnect envelope.
pub const REASON_DISCONNECTED: &str = "disconnected";
/// Reason string carried by a locally synthesized cancellation envelope
/// (a wait superseded by a newer one on a healthy connection).
pub const REASON_CANCELLED: &str = "cancelled";

/// Lifecycle notification from the broker (wire `type:"system"`).
#[derive(Debug, Clone, Deserialize)]
pub struct SystemEnvelope {
    /// Event name, e.g. `"connected"`.
    pub event: String,
    /// Broker-side user id for this connection.
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    /// Broker-assigned connection id.
    #[serde(default, rename = "connectionId")]
    pub connection_id: Option<String>,
}

/// Acknowledgement of a previously sent operation (wire `type:"ack"`).
#[derive(Debug, Clone, Deserialize)]
pub struct AckEnvelope {
    /// Correlation id echoed from the outgoing frame.
    #[serde(rename = "ackId")]
    pub ack_id: u64,
    /// Whether the acknowledged operation succeeded.
    #[serde(default)]
    pub success: bool,
}

/// Application payload broadcast to the group (wire `type:"message"`).
#[derive(Debug, Clone, Deserialize)]
pub struct GroupEnvelope {
    /// Origin kind, e.g. `"group"`.
    #[serde(default)]
    pub from: Option<String>,
    /// User id of the sender.
    #[serde(default, rename = "fromUserId")]
    pub from_user_id: Option<String>,
    /// Group the payload was sent to.
    #[serde(default)]
    pub group: Option<String>,
    /// Declared payload type, normally `"json"`.
    #[serde(default, rename = "dataType")]
    pub data_type: Option<String>,
    /// Opaque payload (string, object, or array) for the second decode pass.
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

/// Locally synthesized failure result. Never received from the wire.
#[derive(Debug, Clone)]
pub struct ErrorEnvelope {
    /// `"timeout"`, `"disconnected"`, or `"cancelled"`.
    pub reason: String,
}

/// One inbound (or synthesized) broker frame. Exactly one variant is active.
#[derive(Debug, Clone)]
pub enum Envelope {
    System(SystemEnvelope),
    Ack(AckEnvelope),
    Group(GroupEnvelope),
    Error(ErrorEnvelope),
}

/// Minimal header used for classification; serde skips every other field.
#[derive(Deserialize)]
struct Header {
    #[serde(rename = "type")]
    kind: String,
}

impl Envelope {
    /// Decode a raw text frame into the matching envelope shape.
    ///
    /// An unrecognized `type` value is an error the caller is expected to
    /// log and drop; it must never tear down the session.
    pub fn decode(raw: &str) -> Result<Envelope> {
        let header: Header = serde_json::from_str(raw)
            .map_err(|e| LumicastError::Protocol(format!("invalid frame json: {e}")))?;

        match header.kind.as_str() {
            "system" => Ok(Envelope::System(Self::full_decode(raw)?)),
            "ack" => Ok(Envelope::Ack(Self::full_decode(raw)?)),
            "message" => Ok(Envelope::Group(Self::full_decode(raw)?)),
            other => Err(LumicastError::UnknownEnvelopeType(other.to_string())),
        }
    }

    fn full_decode<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T> {
        serde_json::from_str(raw)
            .map_err(|e| LumicastError::Protocol(format!("invalid envelope body: {e}")))
    }

    /// Synthesized result for a correlated wait that exceeded its deadline.
    pub fn timeout() -> Envelope {
        Envelope::Error(ErrorEnvelope {
            reason: REASON_TIMEOUT.to_string(),
        })
    }

    /// Synthesized result for a wait interrupted by connection loss.
    pub fn disconnected() -> Envelope {
        Envelope::Error(ErrorEnvelope {
            reason: REASON_DISCONNECTED.to_string(),
        })
    }

    /// Synthesized result for a wait superseded while the connection is
    /// still healthy.
    pub fn cancelled() -> Envelope {
        Envelope::Error(ErrorEnvelope {
            reason: REASON_CANCELLED.to_string(),
        })
    }

    /// Stable name of the active variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::System(_) => "system",
            Envelope::Ack(_) => "ack",
            Envelope::Group(_) => "message",
            Envelope::Error(_) => "error",
        }
    }

    /// True for an ack that reports success.
    pub fn is_success_ack(&self) -> bool {
        matches!(self, Envelope::Ack(a) if a.success)
    }
}
