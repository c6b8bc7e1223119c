//! # Event-Set Catalog
//!
//! Declarative enrichment: an [`EventSet`] maps field values to visual
//! markers and metadata overlays, and declares per-field transforms
//! (redact/truncate/hash). The catalog resolves an event against every
//! enabled set in one pass.
//!
//! ## Resolution rules
//!
//! - A mapping matches iff `event[match_field] == match_value` (structural
//!   equality, deep for lists and maps)
//! - Markers are ordered by ascending priority, lowest-priority leftmost
//! - Overlay conflicts on the same key are won by higher priority; ties go
//!   to the later-registered set
//! - Field transforms merge across sets with the same conflict rule
//! - Resolution is deterministic and never mutates the input event
//!
//! The catalog is an immutable snapshot (`Arc<[EventSet]>`) built once at
//! hub init from the enabled sets; readers never take a lock.


use std::sync::Arc;

use indexmap::IndexMap;

use crate::event::Event;
use crate::util::fnv1a_hash;
use crate::value::Value;

/// Replacement text for redacted field values.
pub const REDACTED: &str = "[REDACTED]";

/// Per-field value transform declared by an event set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTransform {
  /// Replace the value with [`REDACTED`].
  Redact,
  /// Truncate string values to at most this many characters.
  Truncate(usize),
  /// Replace the value with a hex FNV-1a digest of its string form.
  Hash,
  /// Explicitly leave the field alone (documents intent; the global
  /// sanitizer still applies on top).
  Keep,
}

impl FieldTransform {
  /// Apply the transform to a value, returning the replacement.
  pub fn apply(&self, value: &Value) -> Value {
    match self {
      FieldTransform::Redact => Value::String(REDACTED.to_string()),
      FieldTransform::Truncate(max) => match value {
        Value::String(s) if s.chars().count() > *max => {
          Value::String(s.chars().take(*max).collect())
        },
        other => other.clone(),
      },
      FieldTransform::Hash => {
        let digest = fnv1a_hash(&value.display_string());
        Value::String(format!("{:016x}", digest))
      },
      FieldTransform::Keep => value.clone(),
    }
  }
}

/// One `match_field == match_value → marker + overlay` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMapping {
  pub match_field: String,
  pub match_value: Value,
  /// Short visual token (emoji or text) prefixed to the rendered message.
  pub marker: String,
  /// Fields merged into the event on match.
  pub overlay: IndexMap<String, Value>,
}

impl EventMapping {
  pub fn new(match_field: impl Into<String>, match_value: impl Into<Value>, marker: impl Into<String>) -> Self {
    Self {
      match_field: match_field.into(),
      match_value: match_value.into(),
      marker: marker.into(),
      overlay: IndexMap::new(),
    }
  }

  pub fn overlay(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.overlay.insert(key.into(), value.into());
    self
  }
}

/// A named, immutable bundle of mappings and field transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSet {
  pub name: String,
  /// Higher priority wins overlay conflicts and renders further right.
  pub priority: i32,
  pub mappings: Vec<EventMapping>,
  pub transforms: IndexMap<String, FieldTransform>,
}

impl EventSet {
  pub fn new(name: impl Into<String>, priority: i32) -> Self {
    Self {
      name: name.into(),
      priority,
      mappings: Vec::new(),
      transforms: IndexMap::new(),
    }
  }

  pub fn mapping(mut self, mapping: EventMapping) -> Self {
    self.mappings.push(mapping);
    self
  }

  pub fn transform(mut self, field: impl Into<String>, transform: FieldTransform) -> Self {
    self.transforms.insert(field.into(), transform);
    self
  }
}

/// The output of resolving one event against the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
  /// Markers ascending by priority (lowest leftmost).
  pub markers: Vec<String>,
  /// Winning overlay fields.
  pub overlay: IndexMap<String, Value>,
  /// Winning per-field transforms.
  pub transforms: IndexMap<String, FieldTransform>,
}

impl Enrichment {
  pub fn is_empty(&self) -> bool {
    self.markers.is_empty() && self.overlay.is_empty() && self.transforms.is_empty()
  }
}

/// Immutable, lock-free snapshot of the enabled event sets in registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct EventSetCatalog {
  sets: Arc<[EventSet]>,
}

impl EventSetCatalog {
  /// Snapshot `sets` in registration order.
  pub fn new(sets: Vec<EventSet>) -> Self {
    Self { sets: sets.into() }
  }

  pub fn discover(&self) -> &[EventSet] {
    &self.sets
  }

  /// Resolve `event` against every set.
  pub fn resolve(&self, event: &Event) -> Enrichment {
    // (priority, registration index, mapping) for every match.
    let mut matches: Vec<(i32, usize, &EventMapping)> = Vec::new();
    for (reg_index, set) in self.sets.iter().enumerate() {
      for mapping in &set.mappings {
        let matched = event
          .get(&mapping.match_field)
          .map(|v| *v == mapping.match_value)
          .unwrap_or(false);
        if matched {
          matches.push((set.priority, reg_index, mapping));
        }
      }
    }

    // Ascending (priority, registration index): sequential overlay inserts
    // leave the highest-priority (ties: latest-registered) value in place,
    // and the marker sequence comes out lowest-priority first.
    matches.sort_by_key(|(priority, reg_index, _)| (*priority, *reg_index));

    let mut enrichment = Enrichment::default();
    for (_, _, mapping) in &matches {
      enrichment.markers.push(mapping.marker.clone());
      for (key, value) in &mapping.overlay {
        enrichment.overlay.insert(key.clone(), value.clone());
      }
    }

    // Transforms are declared per set, not per match: merge them across all
    // sets with the same priority/registration conflict rule.
    let mut set_order: Vec<(i32, usize)> = self
      .sets
      .iter()
      .enumerate()
      .map(|(i, s)| (s.priority, i))
      .collect();
    set_order.sort();
    for (_, reg_index) in set_order {
      for (field, transform) in &self.sets[reg_index].transforms {
        enrichment.transforms.insert(field.clone(), transform.clone());
      }
    }

    enrichment
  }
}

/// Built-in `http` event set: status-class markers and categories.
pub fn http_event_set() -> EventSet {
  EventSet::new("http", 10)
    .mapping(
      EventMapping::new("http.status_class", "2xx", "✅").overlay("http.outcome", "success"),
    )
    .mapping(
      EventMapping::new("http.status_class", "3xx", "↪️").overlay("http.outcome", "redirect"),
    )
    .mapping(
      EventMapping::new("http.status_class", "4xx", "⚠️").overlay("http.outcome", "client_error"),
    )
    .mapping(
      EventMapping::new("http.status_class", "5xx", "🔥").overlay("http.outcome", "server_error"),
    )
    .mapping(EventMapping::new("http.method", "GET", "📥"))
    .mapping(EventMapping::new("http.method", "POST", "📤"))
    .transform("http.authorization", FieldTransform::Redact)
}

/// Built-in `database` event set.
pub fn database_event_set() -> EventSet {
  EventSet::new("database", 10)
    .mapping(EventMapping::new("db.outcome", "ok", "🗄️"))
    .mapping(
      EventMapping::new("db.outcome", "error", "💥").overlay("db.failed", true),
    )
    .mapping(EventMapping::new("db.operation", "query", "🔍"))
    .mapping(EventMapping::new("db.operation", "migrate", "🏗️"))
    .transform("db.password", FieldTransform::Redact)
    .transform("db.statement", FieldTransform::Truncate(256))
}

/// Built-in `task` event set for background-work lifecycles.
pub fn task_event_set() -> EventSet {
  EventSet::new("task", 10)
    .mapping(EventMapping::new("task.state", "started", "▶️"))
    .mapping(
      EventMapping::new("task.state", "completed", "✔️").overlay("task.terminal", true),
    )
    .mapping(
      EventMapping::new("task.state", "failed", "❌").overlay("task.terminal", true),
    )
    .mapping(EventMapping::new("task.state", "retrying", "🔄"))
}

/// All built-in event sets in registration order.
pub fn builtin_event_sets() -> Vec<EventSet> {
  vec![http_event_set(), database_event_set(), task_event_set()]
}
