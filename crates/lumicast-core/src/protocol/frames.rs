//! Outbound frame builders.
//!
//! Field names here are the broker's wire contract (`ackId`, `dataType`)
//! and must not change. Typed structs instead of ad hoc string formatting
//! so the payload is always embedded as valid JSON.

use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::{LumicastError, Result};

#[derive(Serialize)]
struct JoinLeaveFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    group: &'a str,
    #[serde(rename = "ackId")]
    ack_id: u64,
}

#[derive(Serialize)]
struct SendToGroupFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    group: &'a str,
    #[serde(rename = "dataType")]
    data_type: &'static str,
    data: &'a RawValue,
    #[serde(rename = "ackId")]
    ack_id: u64,
}

fn encode<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame)
        .map_err(|e| LumicastError::Protocol(format!("frame encode failed: {e}")))
}

/// `{"type":"joinGroup","group":...,"ackId":...}`
pub fn join_group(group: &str, ack_id: u64) -> Result<String> {
    encode(&JoinLeaveFrame {
        kind: "joinGroup",
        group,
        ack_id,
    })
}

/// `{"type":"leaveGroup","group":...,"ackId":...}`
pub fn leave_group(group: &str, ack_id: u64) -> Result<String> {
    encode(&JoinLeaveFrame {
        kind: "leaveGroup",
        group,
        ack_id,
    })
}

/// `{"type":"sendToGroup","group":...,"dataType":"json","data":...,"ackId":...}`
pub fn send_to_group(group: &str, data: &RawValue, ack_id: u64) -> Result<String> {
    encode(&SendToGroupFrame {
        kind: "sendToGroup",
        group,
        data_type: "json",
        data,
        ack_id,
    })
}
