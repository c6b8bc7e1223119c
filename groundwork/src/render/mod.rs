//! # Render Module
//!
//! Terminal step of the processor chain: turn a transformed [`Event`] into
//! output bytes. Two formats are supported:
//!
//! - `key_value`: one line per event, `key=value` pairs separated by single
//!   spaces, values quoted iff they contain spaces or reserved characters,
//!   the marker block prefixed to the bare message
//! - `json`: one JSON object per line (NDJSON), standard fields `timestamp`,
//!   `level`, `logger`, `message`, all other fields as siblings, markers as
//!   a `markers` string array
//!
//! Rendering is total: a value that cannot be serialized faithfully is
//! replaced by its best-effort string form and the affected keys are listed
//! in `_serialization_errors` — the event is never dropped and the call
//! never fails.

mod __test__;

use std::io::Write;

use chrono::SecondsFormat;
use smallvec::SmallVec;

use crate::event::Event;
use crate::value::Value;

/// Internal field carrying resolved markers between the event-set processor
/// and the renderer. Never rendered under its own name.
pub const MARKERS_FIELD: &str = "_markers";

/// Reusable output line buffer. Spills to the heap past 256 bytes.
pub struct LineBuffer(pub SmallVec<[u8; 256]>);

impl LineBuffer {
  pub fn new() -> Self {
    LineBuffer(SmallVec::new())
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.0
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }

  pub fn into_inner(self) -> SmallVec<[u8; 256]> {
    self.0
  }
}

impl Default for LineBuffer {
  fn default() -> Self {
    Self::new()
  }
}

impl Write for LineBuffer {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

/// Renders one event into `out` (no trailing newline; sinks append it).
/// Returns the number of values that had to be degraded.
pub trait Formatter: Send + Sync + 'static {
  fn name(&self) -> &'static str;
  fn format(&self, event: &Event, out: &mut LineBuffer) -> usize;
}

fn timestamp_string(event: &Event) -> Option<String> {
  event
    .timestamp
    .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn markers_of(event: &Event) -> Vec<&str> {
  match event.get(MARKERS_FIELD) {
    Some(Value::List(items)) => items.iter().filter_map(Value::as_str).collect(),
    _ => Vec::new(),
  }
}

/// `key=value` single-line formatter.
pub struct KeyValueFormatter;

const RESERVED: &[char] = &[' ', '"', '=', '\n', '\t'];

fn needs_quoting(s: &str) -> bool {
  s.is_empty() || s.contains(RESERVED)
}

fn write_scalar(out: &mut LineBuffer, s: &str) {
  if needs_quoting(s) {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
    let _ = write!(out, "\"{}\"", escaped);
  } else {
    let _ = out.write_all(s.as_bytes());
  }
}

impl Formatter for KeyValueFormatter {
  fn name(&self) -> &'static str {
    "key_value"
  }

  fn format(&self, event: &Event, out: &mut LineBuffer) -> usize {
    let mut degraded: Vec<String> = Vec::new();

    if let Some(ts) = timestamp_string(event) {
      let _ = write!(out, "timestamp={} ", ts);
    }
    let _ = write!(out, "level={} logger=", event.level);
    write_scalar(out, &event.logger_name);
    let _ = out.write_all(b" ");

    let markers = markers_of(event);
    if !markers.is_empty() {
      for marker in &markers {
        let _ = write!(out, "[{}]", marker);
      }
      let _ = out.write_all(b" ");
    }
    // The message is positional, not a key=value pair.
    let _ = out.write_all(event.message.as_bytes());

    for (key, value) in &event.fields {
      if key == MARKERS_FIELD {
        continue;
      }
      let _ = write!(out, " {}=", key);
      match value {
        Value::Float(f) if !f.is_finite() => {
          degraded.push(key.clone());
          write_scalar(out, &value.display_string());
        },
        other => write_scalar(out, &other.display_string()),
      }
    }

    if !degraded.is_empty() {
      degraded.dedup();
      let _ = write!(out, " _serialization_errors=");
      write_scalar(out, &degraded.join(","));
    }
    degraded.len()
  }
}

/// NDJSON formatter: one object per line.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
  fn name(&self) -> &'static str {
    "json"
  }

  fn format(&self, event: &Event, out: &mut LineBuffer) -> usize {
    let mut errors: Vec<String> = Vec::new();
    let mut object = serde_json::Map::new();

    if let Some(ts) = timestamp_string(event) {
      object.insert("timestamp".to_string(), serde_json::Value::String(ts));
    }
    object.insert(
      "level".to_string(),
      serde_json::Value::String(event.level.as_str().to_string()),
    );
    object.insert(
      "logger".to_string(),
      serde_json::Value::String(event.logger_name.clone()),
    );
    object.insert(
      "message".to_string(),
      serde_json::Value::String(event.message.clone()),
    );

    let markers = markers_of(event);
    if !markers.is_empty() {
      object.insert(
        "markers".to_string(),
        serde_json::Value::Array(
          markers
            .iter()
            .map(|m| serde_json::Value::String(m.to_string()))
            .collect(),
        ),
      );
    }

    for (key, value) in &event.fields {
      if key == MARKERS_FIELD {
        continue;
      }
      object.insert(key.clone(), value.to_json_checked(key, &mut errors));
    }

    errors.dedup();
    if !errors.is_empty() {
      object.insert(
        "_serialization_errors".to_string(),
        serde_json::Value::Array(
          errors
            .iter()
            .map(|k| serde_json::Value::String(k.clone()))
            .collect(),
        ),
      );
    }

    let count = errors.len();
    match serde_json::to_vec(&serde_json::Value::Object(object)) {
      Ok(bytes) => {
        let _ = out.write_all(&bytes);
      },
      Err(_) => {
        // Last-ditch degradation; should be unreachable since every value
        // was already converted through to_json_checked.
        let _ = write!(
          out,
          "{{\"level\":\"{}\",\"logger\":{:?},\"message\":{:?}}}",
          event.level, event.logger_name, event.message
        );
      },
    }
    count
  }
}

/// Formatter for the active console format.
pub fn formatter_for(kind: crate::context::ConsoleFormatter) -> std::sync::Arc<dyn Formatter> {
  match kind {
    crate::context::ConsoleFormatter::KeyValue => std::sync::Arc::new(KeyValueFormatter),
    crate::context::ConsoleFormatter::Json => std::sync::Arc::new(JsonFormatter),
  }
}
