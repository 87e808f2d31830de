//! Session lifecycle states.

use std::fmt;

/// Connection/group lifecycle. Transitions only move forward within one
/// connection attempt; reconnecting tears everything down and starts over
/// from `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    GroupJoined,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether group traffic may be sent in this state.
    pub fn can_publish(self) -> bool {
        matches!(self, SessionState::GroupJoined)
    }

    /// Whether `connect` may be called from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::GroupJoined => "group-joined",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
