//! LED command-batch decoder.
//!
//! The `data` payload of a group envelope is decoded into a [`Message`] by
//! a structural walk with an explicit token-kind check per field, never a
//! derive-based deserialize. The contract is asymmetric on purpose:
//!
//! - a *known* field carrying the wrong JSON kind fails the decode, naming
//!   the field and the kind found;
//! - an *unknown* field name is logged at debug level and skipped, so the
//!   producer can grow the schema ahead of deployed clients.
//!
//! Colors are strict positional `[r,g,b]` 3-tuples; components are
//! truncated to 8 bits.

use serde_json::{Map, Value};

use crate::error::{LumicastError, Result};
use crate::protocol::envelope::GroupEnvelope;

/// A 3-byte RGB triple, decoded from a positional `[r,g,b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }
}

/// Column index plus the color to drive it with (for `ColumnFade`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnColor {
    pub index: i32,
    pub color: Color,
}

/// A single addressed pixel (for `SetPixels`).
///
/// Wire keys are shorthand: `"s"` for strip, `"l"` for led. The producer
/// batches thousands of these per frame, so the short keys are a payload
/// size optimization, not an accident.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pixel {
    pub strip: i32,
    pub led: String,
    pub color: Color,
}

/// One LED/color operation. Every field is optional on the wire and
/// defaults to zero/empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub target: String,
    pub command: String,
    pub name: String,
    pub speed: i32,
    pub direction: i32,
    pub size: i32,
    pub strip: i32,
    pub index: i32,
    pub seconds: i32,
    pub iterations: i32,
    pub f1: f64,
    pub f2: f64,
    pub start: String,
    pub sequence: i32,
    pub colors: Vec<Color>,
    pub columns: Vec<ColumnColor>,
    pub pixels: Vec<Pixel>,
}

/// Decoded application message: either a slash-delimited directive in
/// `text` (e.g. `/state/off`) or a batch of `commands`, never both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub user: String,
    pub text: String,
    pub from_group: String,
    pub group: String,
    pub commands: Vec<Command>,
}

impl Message {
    /// Decode the payload of a group envelope, carrying over the sender and
    /// group fields from the envelope itself.
    pub fn from_group(env: &GroupEnvelope) -> Result<Message> {
        let mut msg = Message {
            user: env.from_user_id.clone().unwrap_or_default(),
            from_group: env.from.clone().unwrap_or_default(),
            group: env.group.clone().unwrap_or_default(),
            ..Message::default()
        };

        let Some(data) = &env.data else {
            return Ok(msg);
        };
        if let Some(dt) = &env.data_type {
            if dt != "json" {
                tracing::debug!(data_type = %dt, "unexpected dataType on group message");
            }
        }

        let value: Value = serde_json::from_str(data.get())
            .map_err(|e| LumicastError::Protocol(format!("invalid data payload: {e}")))?;
        match value {
            Value::String(s) => msg.text = s,
            Value::Object(obj) => msg.commands = vec![decode_command(&obj)?],
            Value::Array(items) => msg.commands = decode_command_array(&items)?,
            other => {
                return Err(LumicastError::Decode {
                    field: "data",
                    expected: "string, object, or array",
                    found: json_kind(&other).to_string(),
                })
            }
        }
        Ok(msg)
    }
}

impl Command {
    /// Encode to the wire JSON shape, omitting zero/empty fields so the
    /// payload stays small. Inverse of [`decode_command`] for every
    /// populated field.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (name, s) in [
            ("target", &self.target),
            ("command", &self.command),
            ("name", &self.name),
            ("start", &self.start),
        ] {
            if !s.is_empty() {
                obj.insert(name.to_string(), Value::String(s.clone()));
            }
        }
        for (name, i) in [
            ("speed", self.speed),
            ("direction", self.direction),
            ("size", self.size),
            ("strip", self.strip),
            ("index", self.index),
            ("seconds", self.seconds),
            ("iterations", self.iterations),
            ("sequence", self.sequence),
        ] {
            if i != 0 {
                obj.insert(name.to_string(), Value::from(i));
            }
        }
        for (name, f) in [("f1", self.f1), ("f2", self.f2)] {
            if f != 0.0 {
                obj.insert(name.to_string(), Value::from(f));
            }
        }
        if !self.colors.is_empty() {
            obj.insert(
                "colors".to_string(),
                Value::Array(self.colors.iter().map(color_to_value).collect()),
            );
        }
        if !self.columns.is_empty() {
            let cols = self
                .columns
                .iter()
                .map(|c| {
                    let mut o = Map::new();
                    o.insert("index".to_string(), Value::from(c.index));
                    o.insert("color".to_string(), color_to_value(&c.color));
                    Value::Object(o)
                })
                .collect();
            obj.insert("columns".to_string(), Value::Array(cols));
        }
        if !self.pixels.is_empty() {
            let px = self
                .pixels
                .iter()
                .map(|p| {
                    let mut o = Map::new();
                    o.insert("s".to_string(), Value::from(p.strip));
                    o.insert("l".to_string(), Value::String(p.led.clone()));
                    o.insert("color".to_string(), color_to_value(&p.color));
                    Value::Object(o)
                })
                .collect();
            obj.insert("pixels".to_string(), Value::Array(px));
        }
        Value::Object(obj)
    }
}

fn color_to_value(c: &Color) -> Value {
    Value::Array(vec![
        Value::from(c.r),
        Value::from(c.g),
        Value::from(c.b),
    ])
}

/// Stable JSON token-kind name, used in decode errors and skip logs.
fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(field: &'static str, expected: &'static str, found: &Value) -> LumicastError {
    LumicastError::Decode {
        field,
        expected,
        found: json_kind(found).to_string(),
    }
}

/// Decode a JSON array of command objects.
pub fn decode_command_array(items: &[Value]) -> Result<Vec<Command>> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(obj) => result.push(decode_command(obj)?),
            other => {
                return Err(LumicastError::Decode {
                    field: "data",
                    expected: "array of command objects",
                    found: json_kind(other).to_string(),
                })
            }
        }
    }
    Ok(result)
}

/// Expected token kind for each known command field.
fn known_command_kind(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "target" => Some(("target", "string")),
        "command" => Some(("command", "string")),
        "name" => Some(("name", "string")),
        "start" => Some(("start", "string")),
        "speed" => Some(("speed", "integer")),
        "direction" => Some(("direction", "integer")),
        "size" => Some(("size", "integer")),
        "strip" => Some(("strip", "integer")),
        "index" => Some(("index", "integer")),
        "seconds" => Some(("seconds", "integer")),
        "iterations" => Some(("iterations", "integer")),
        "sequence" => Some(("sequence", "integer")),
        "f1" => Some(("f1", "float")),
        "f2" => Some(("f2", "float")),
        "colors" => Some(("colors", "array")),
        "columns" => Some(("columns", "array")),
        "pixels" => Some(("pixels", "array")),
        _ => None,
    }
}

/// Decode a single command object.
pub fn decode_command(obj: &Map<String, Value>) -> Result<Command> {
    let mut cmd = Command::default();
    for (name, value) in obj {
        let Some((field, expected)) = known_command_kind(name) else {
            tracing::debug!(field = %name, kind = json_kind(value), "skipping unknown command field");
            continue;
        };

        match expected {
            "string" => {
                let Value::String(s) = value else {
                    return Err(type_mismatch(field, expected, value));
                };
                match field {
                    "target" => cmd.target = s.clone(),
                    "command" => cmd.command = s.clone(),
                    "name" => cmd.name = s.clone(),
                    _ => cmd.start = s.clone(),
                }
            }
            "integer" => {
                let Some(i) = value.as_i64() else {
                    return Err(type_mismatch(field, expected, value));
                };
                let i = i as i32;
                match field {
                    "speed" => cmd.speed = i,
                    "direction" => cmd.direction = i,
                    "size" => cmd.size = i,
                    "strip" => cmd.strip = i,
                    "index" => cmd.index = i,
                    "seconds" => cmd.seconds = i,
                    "iterations" => cmd.iterations = i,
                    _ => cmd.sequence = i,
                }
            }
            "float" => {
                // Integer literals are acceptable for a double field.
                let Some(f) = value.as_f64() else {
                    return Err(type_mismatch(field, expected, value));
                };
                if field == "f1" {
                    cmd.f1 = f;
                } else {
                    cmd.f2 = f;
                }
            }
            _ => {
                let Value::Array(items) = value else {
                    return Err(type_mismatch(field, expected, value));
                };
                match field {
                    "colors" => cmd.colors = decode_colors(items)?,
                    "columns" => cmd.columns = decode_columns(items)?,
                    _ => cmd.pixels = decode_pixels(items)?,
                }
            }
        }
    }
    Ok(cmd)
}

fn decode_colors(items: &[Value]) -> Result<Vec<Color>> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(triple) => result.push(decode_color(triple, "colors")?),
            other => return Err(type_mismatch("colors", "array of [r,g,b]", other)),
        }
    }
    Ok(result)
}

fn decode_color(triple: &[Value], field: &'static str) -> Result<Color> {
    if triple.len() != 3 {
        return Err(LumicastError::Decode {
            field,
            expected: "[r,g,b] 3-tuple",
            found: format!("{}-element array", triple.len()),
        });
    }
    let mut rgb = [0u8; 3];
    for (slot, item) in rgb.iter_mut().zip(triple) {
        let Some(i) = item.as_i64() else {
            return Err(type_mismatch(field, "integer color component", item));
        };
        *slot = i as u8;
    }
    Ok(Color::new(rgb[0], rgb[1], rgb[2]))
}

fn decode_columns(items: &[Value]) -> Result<Vec<ColumnColor>> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(obj) => result.push(decode_column_color(obj)?),
            other => return Err(type_mismatch("columns", "array of column objects", other)),
        }
    }
    Ok(result)
}

/// Column entries are strict: an unknown property is an error, not a skip.
fn decode_column_color(obj: &Map<String, Value>) -> Result<ColumnColor> {
    let mut col = ColumnColor::default();
    for (name, value) in obj {
        match name.as_str() {
            "index" => {
                let Some(i) = value.as_i64() else {
                    return Err(type_mismatch("columns", "integer index", value));
                };
                col.index = i as i32;
            }
            "color" => {
                let Value::Array(triple) = value else {
                    return Err(type_mismatch("columns", "[r,g,b] color array", value));
                };
                col.color = decode_color(triple, "columns")?;
            }
            other => {
                return Err(LumicastError::Protocol(format!(
                    "unexpected property `{other}` in column color"
                )))
            }
        }
    }
    Ok(col)
}

fn decode_pixels(items: &[Value]) -> Result<Vec<Pixel>> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(obj) => result.push(decode_pixel(obj)?),
            other => return Err(type_mismatch("pixels", "array of pixel objects", other)),
        }
    }
    Ok(result)
}

/// Pixel entries use shorthand keys and tolerate unknown names, since this
/// is the highest-volume part of the payload and the most likely to grow.
fn decode_pixel(obj: &Map<String, Value>) -> Result<Pixel> {
    let mut px = Pixel::default();
    for (name, value) in obj {
        match (name.as_str(), value) {
            ("s", v) => {
                let Some(i) = v.as_i64() else {
                    return Err(type_mismatch("pixels", "integer strip (`s`)", v));
                };
                px.strip = i as i32;
            }
            ("l", v) => {
                let Value::String(s) = v else {
                    return Err(type_mismatch("pixels", "string led (`l`)", v));
                };
                px.led = s.clone();
            }
            ("color", v) => {
                let Value::Array(triple) = v else {
                    return Err(type_mismatch("pixels", "[r,g,b] color array", v));
                };
                px.color = decode_color(triple, "pixels")?;
            }
            (other, v) => {
                tracing::debug!(field = %other, kind = json_kind(v), "skipping unknown pixel field");
            }
        }
    }
    Ok(px)
}
