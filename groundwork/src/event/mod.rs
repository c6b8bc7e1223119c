//! # Event Module
//!
//! Core data structures for the structured logging pipeline: the severity
//! [`Level`] and the [`Event`] record that processors transform.
//!
//! ## Design
//!
//! An event is an ordered mapping from string keys to [`Value`]s plus the
//! reserved fields every event carries: `timestamp`, `level`, `logger_name`,
//! `message`, and the optional captured error chain `exc_info`. Field order
//! is insertion order, which keeps rendered output deterministic.
//!
//! ## Usage
//!
//! ```rust
//! use groundwork::event::{Event, Level};
//! use groundwork::value::Value;
//!
//! let mut event = Event::new(Level::Info, "db.pool", "connection acquired");
//! event.insert("wait_ms", Value::Int(12));
//!
//! assert_eq!(event.level, Level::Info);
//! assert_eq!(event.fields.get("wait_ms"), Some(&Value::Int(12)));
//! ```


use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::FoundationError;
use crate::value::{ErrorChain, Value};

/// Log severity level with compact u8 representation.
///
/// # Ordering
///
/// Levels implement `Ord` with natural ordering:
/// TRACE < DEBUG < INFO < WARNING < ERROR < CRITICAL. This enables level
/// filtering: `if event.level >= Level::Warning { ... }`
///
/// # Serialization
///
/// Serializes as lowercase string values (`"trace"`, `"debug"`, ...) for
/// human readability in JSON output.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
  Trace = 0,
  Debug = 1,
  Info = 2,
  Warning = 3,
  Error = 4,
  Critical = 5,
}

impl Level {
  /// Lowercase canonical name.
  #[inline]
  pub fn as_str(&self) -> &'static str {
    match self {
      Level::Trace => "trace",
      Level::Debug => "debug",
      Level::Info => "info",
      Level::Warning => "warning",
      Level::Error => "error",
      Level::Critical => "critical",
    }
  }

  /// All levels, ascending.
  pub const ALL: [Level; 6] = [
    Level::Trace,
    Level::Debug,
    Level::Info,
    Level::Warning,
    Level::Error,
    Level::Critical,
  ];
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Level {
  type Err = FoundationError;

  /// Case-insensitive parse of the six level names. Unknown names are a
  /// configuration error, never silently coerced.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "trace" => Ok(Level::Trace),
      "debug" => Ok(Level::Debug),
      "info" => Ok(Level::Info),
      "warning" => Ok(Level::Warning),
      "error" => Ok(Level::Error),
      "critical" => Ok(Level::Critical),
      other => Err(FoundationError::invalid_config(
        "level",
        format!("unknown level name '{}'", other),
      )),
    }
  }
}

/// A single structured log event.
///
/// Events are value types: processors take ownership, transform, and hand the
/// result on (or drop it). Nothing in the pipeline mutates an event another
/// component still holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  /// UTC instant stamped by the base-context processor; `None` until then,
  /// and stays `None` when timestamps are configured off.
  pub timestamp: Option<DateTime<Utc>>,
  pub level: Level,
  /// Dotted logger name, e.g. `"db.pool"`.
  pub logger_name: String,
  /// The first positional argument of the log call.
  pub message: String,
  /// Bound and call-site fields, insertion-ordered.
  pub fields: IndexMap<String, Value>,
  /// Captured error chain when the call site used `exception(...)`.
  pub exc_info: Option<ErrorChain>,
}

impl Event {
  pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      timestamp: None,
      level,
      logger_name: logger_name.into(),
      message: message.into(),
      fields: IndexMap::new(),
      exc_info: None,
    }
  }

  /// Insert a field, overwriting any existing value for the key while
  /// keeping the key's original position.
  #[inline]
  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    self.fields.insert(key.into(), value);
  }

  /// Insert only if the key is absent. Used for base-context fields, which
  /// must never override call-site data.
  #[inline]
  pub fn insert_missing(&mut self, key: &str, value: Value) {
    if !self.fields.contains_key(key) {
      self.fields.insert(key.to_string(), value);
    }
  }

  #[inline]
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.get(key)
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Event(level={}, logger={}, message={:?})",
      self.level, self.logger_name, self.message
    )
  }
}
