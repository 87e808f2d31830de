//! Protocol modules (broker envelopes + LED command batches).
//!
//! Two decode passes over every inbound frame:
//! - `envelope`: classify by the JSON `type` value and decode the matching
//!   envelope shape, keeping the application payload as raw JSON.
//! - `command`: decode that payload into a `Message` of LED commands.
//!
//! All parsers are panic-free: malformed input is reported as
//! `LumicastError` instead of panicking, keeping a session resilient to
//! whatever the broker delivers.

pub mod command;
pub mod envelope;
pub mod frames;
