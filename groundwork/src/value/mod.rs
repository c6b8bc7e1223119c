//! # Log Value Module
//!
//! Tagged value representation for structured log fields.
//!
//! ## Design Philosophy
//!
//! Log call sites hand the pipeline arbitrary data. Rather than trait objects
//! or reflection, every field value is converted at the logger boundary into
//! one [`Value`] variant:
//!
//! - **Type safety**: processors and formatters match on a closed set
//! - **Structural equality**: event-set matching compares sequences and maps
//!   deeply
//! - **Total rendering**: conversion to JSON never fails; unsupported or
//!   non-finite data degrades to a best-effort string and the affected key is
//!   reported back to the renderer
//!
//! ## Usage
//!
//! ```rust
//! use groundwork::value::Value;
//! use groundwork::fields;
//!
//! let fields = fields! {
//!   "user" => "ana",
//!   "attempt" => 3,
//!   "success" => true,
//! };
//! assert_eq!(fields[1].1, Value::Int(3));
//! ```


use indexmap::IndexMap;

/// Maximum nesting depth the JSON converter will walk before substituting
/// `"<cycle>"`. Value trees are built by conversion and cannot be truly
/// cyclic, but adversarially deep trees must not overflow the stack.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Placeholder emitted for values nested beyond [`MAX_VALUE_DEPTH`].
pub const CYCLE_PLACEHOLDER: &str = "<cycle>";

/// A dynamically-typed log field value.
///
/// Maps are insertion-ordered so rendered output is deterministic for
/// identical inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  Bytes(Vec<u8>),
  List(Vec<Value>),
  Map(IndexMap<String, Value>),
  /// A captured error chain, outermost message first.
  Error(ErrorChain),
}

/// Captured rendering of a `std::error::Error` and its `source()` chain.
///
/// Only the `Display` output of each link survives capture; the original
/// error object does not travel through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorChain {
  /// Outermost error first.
  pub messages: Vec<String>,
}

impl ErrorChain {
  /// Walk `err` and its sources, recording each link's `Display` output.
  pub fn capture(err: &(dyn std::error::Error + 'static)) -> Self {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(src) = current {
      messages.push(src.to_string());
      current = src.source();
    }
    ErrorChain { messages }
  }

  /// The outermost message.
  pub fn message(&self) -> &str {
    self.messages.first().map(String::as_str).unwrap_or("")
  }

  /// All messages joined with `": "`, outermost first.
  pub fn joined(&self) -> String {
    self.messages.join(": ")
  }
}

impl Value {
  /// Best-effort single-line string form, used by the key=value formatter
  /// and as the degraded form of non-serializable data.
  pub fn display_string(&self) -> String {
    match self {
      Value::Null => "null".to_string(),
      Value::Bool(b) => b.to_string(),
      Value::Int(i) => i.to_string(),
      Value::Float(f) => {
        if f.is_finite() {
          f.to_string()
        } else {
          format!("<non-finite:{}>", f)
        }
      },
      Value::String(s) => s.clone(),
      Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
      Value::List(_) | Value::Map(_) => {
        let mut errors = Vec::new();
        self.to_json_checked("", &mut errors).to_string()
      },
      Value::Error(chain) => chain.joined(),
    }
  }

  /// Convert to a `serde_json::Value`, depth-capped.
  ///
  /// `key` names the field being converted; any key whose value had to be
  /// degraded (non-finite float, depth cap) is appended to `errors` so the
  /// renderer can attach a `_serialization_errors` field instead of dropping
  /// the event.
  pub fn to_json_checked(&self, key: &str, errors: &mut Vec<String>) -> serde_json::Value {
    self.to_json_depth(key, 0, errors)
  }

  fn to_json_depth(&self, key: &str, depth: usize, errors: &mut Vec<String>) -> serde_json::Value {
    if depth >= MAX_VALUE_DEPTH {
      if !key.is_empty() {
        errors.push(key.to_string());
      }
      return serde_json::Value::String(CYCLE_PLACEHOLDER.to_string());
    }

    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Int(i) => serde_json::Value::Number((*i).into()),
      Value::Float(f) => match serde_json::Number::from_f64(*f) {
        Some(n) => serde_json::Value::Number(n),
        None => {
          // NaN / infinity have no JSON form; degrade to a string
          if !key.is_empty() {
            errors.push(key.to_string());
          }
          serde_json::Value::String(format!("<non-finite:{}>", f))
        },
      },
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
      Value::List(items) => serde_json::Value::Array(
        items
          .iter()
          .map(|item| item.to_json_depth(key, depth + 1, errors))
          .collect(),
      ),
      Value::Map(map) => {
        let mut out = serde_json::Map::with_capacity(map.len());
        for (k, v) in map {
          out.insert(k.clone(), v.to_json_depth(key, depth + 1, errors));
        }
        serde_json::Value::Object(out)
      },
      Value::Error(chain) => {
        serde_json::Value::Array(chain.messages.iter().cloned().map(serde_json::Value::String).collect())
      },
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s.as_str()),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  /// Raw byte payload. Not a `From` impl: `Vec<u8>` would collide with the
  /// generic `Vec<T>` conversion, which treats `u8` items as integers.
  pub fn bytes(v: Vec<u8>) -> Value {
    Value::Bytes(v)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<i8> for Value {
  fn from(v: i8) -> Self {
    Value::Int(v as i64)
  }
}

impl From<i16> for Value {
  fn from(v: i16) -> Self {
    Value::Int(v as i64)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Value::Int(v as i64)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::Int(v)
  }
}

impl From<u8> for Value {
  fn from(v: u8) -> Self {
    Value::Int(v as i64)
  }
}

impl From<u16> for Value {
  fn from(v: u16) -> Self {
    Value::Int(v as i64)
  }
}

impl From<u32> for Value {
  fn from(v: u32) -> Self {
    Value::Int(v as i64)
  }
}

impl From<u64> for Value {
  /// Values above `i64::MAX` degrade to their decimal string form.
  fn from(v: u64) -> Self {
    match i64::try_from(v) {
      Ok(i) => Value::Int(i),
      Err(_) => Value::String(v.to_string()),
    }
  }
}

impl From<usize> for Value {
  fn from(v: usize) -> Self {
    Value::from(v as u64)
  }
}

impl From<f32> for Value {
  fn from(v: f32) -> Self {
    Value::Float(v as f64)
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Float(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::String(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::String(v)
  }
}

impl From<ErrorChain> for Value {
  fn from(v: ErrorChain) -> Self {
    Value::Error(v)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(v: Vec<T>) -> Self {
    Value::List(v.into_iter().map(Into::into).collect())
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self {
    match v {
      Some(inner) => inner.into(),
      None => Value::Null,
    }
  }
}

/// Build a `Vec<(String, Value)>` of call-site fields.
///
/// ```rust
/// use groundwork::fields;
/// let kv = fields! { "user" => "ana", "attempt" => 3 };
/// assert_eq!(kv.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
  () => {
    ::std::vec::Vec::<(::std::string::String, $crate::value::Value)>::new()
  };
  ($($key:expr => $val:expr),+ $(,)?) => {
    ::std::vec![
      $( (::std::string::String::from($key), $crate::value::Value::from($val)) ),+
    ]
  };
}
