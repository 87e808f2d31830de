use serde::Deserialize;

use lumicast_core::{LumicastError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Broker client URL (credentials embedded), handed to the negotiator.
    pub endpoint: String,

    /// Hub name, e.g. `"AdaKiosk"`.
    pub hub: String,

    /// This client's user id; also the echo-suppression key.
    pub user: String,

    /// Group to join.
    pub group: String,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    /// Capacity of the unsolicited-message broadcast buffer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("hub", &self.hub),
            ("user", &self.user),
            ("group", &self.group),
        ] {
            if value.is_empty() {
                return Err(LumicastError::Config(format!("{name} must not be empty")));
            }
        }
        if !(8..=4096).contains(&self.event_buffer) {
            return Err(LumicastError::Config(
                "event_buffer must be between 8 and 4096".into(),
            ));
        }
        self.timeouts.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSection {
    /// Bound on the open + connected-envelope + join handshake steps.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Default deadline for a correlated send.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Grace period for the best-effort leaveGroup during close.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl TimeoutSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120000).contains(&self.connect_timeout_ms) {
            return Err(LumicastError::Config(
                "timeouts.connect_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(100..=60000).contains(&self.ack_timeout_ms) {
            return Err(LumicastError::Config(
                "timeouts.ack_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(100..=30000).contains(&self.close_grace_ms) {
            return Err(LumicastError::Config(
                "timeouts.close_grace_ms must be between 100 and 30000".into(),
            ));
        }
        Ok(())
    }
}

fn default_connect_timeout_ms() -> u64 {
    20000
}
fn default_ack_timeout_ms() -> u64 {
    10000
}
fn default_close_grace_ms() -> u64 {
    5000
}
fn default_event_buffer() -> usize {
    256
}
