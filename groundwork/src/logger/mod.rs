//! # Logger Core
//!
//! The bound-logger façade. A [`Logger`] is a value type carrying its dotted
//! name and bound context; `bind` returns a new logger and never mutates the
//! original. Level methods construct an event, merge bound and call-site
//! fields (call-site wins), and dispatch through the pipeline.
//!
//! ## Fast path
//!
//! A suppressed call must cost no more than one cache lookup: the effective
//! level is checked before any event construction. Effective levels resolve
//! by longest-dotted-prefix match over the configured module levels and are
//! cached per logger name; the cache lives inside the [`LevelResolver`],
//! which is rebuilt whenever the configuration snapshot changes.
//!
//! ## Error policy
//!
//! Nothing a level method does may propagate to the caller. Dispatch
//! failures are captured by the pipeline and counted.


use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::event::{Event, Level};
use crate::pipeline::Pipeline;
use crate::value::{ErrorChain, Value};

/// Resolves effective levels with a per-name cache.
pub struct LevelResolver {
  default_level: Level,
  /// `(prefix, level)` in declaration order.
  module_levels: Vec<(String, Level)>,
  cache: RwLock<HashMap<String, Level>>,
}

impl LevelResolver {
  pub fn new(default_level: Level, module_levels: &IndexMap<String, Level>) -> Self {
    Self {
      default_level,
      module_levels: module_levels
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect(),
      cache: RwLock::new(HashMap::new()),
    }
  }

  /// Longest-prefix match over the module levels, falling back to the
  /// default. Pure per configuration; cached per name.
  pub fn effective(&self, name: &str) -> Level {
    if let Some(level) = self.cache.read().expect("level cache poisoned").get(name) {
      return *level;
    }
    let level = self.resolve_uncached(name);
    self
      .cache
      .write()
      .expect("level cache poisoned")
      .insert(name.to_string(), level);
    level
  }

  fn resolve_uncached(&self, name: &str) -> Level {
    let mut best: Option<(usize, Level)> = None;
    for (prefix, level) in &self.module_levels {
      let matches = name == prefix
        || (name.len() > prefix.len()
          && name.starts_with(prefix.as_str())
          && name.as_bytes()[prefix.len()] == b'.');
      if matches {
        let better = best.map(|(len, _)| prefix.len() > len).unwrap_or(true);
        if better {
          best = Some((prefix.len(), *level));
        }
      }
    }
    best.map(|(_, level)| level).unwrap_or(self.default_level)
  }

  pub fn default_level(&self) -> Level {
    self.default_level
  }
}

/// A named logger with bound context. Cheap to clone; bound context is
/// shared structurally.
#[derive(Clone)]
pub struct Logger {
  name: Arc<str>,
  bound: Arc<IndexMap<String, Value>>,
  pipeline: Arc<Pipeline>,
  resolver: Arc<LevelResolver>,
}

impl Logger {
  pub fn new(name: &str, pipeline: Arc<Pipeline>, resolver: Arc<LevelResolver>) -> Self {
    Self {
      name: Arc::from(name),
      bound: Arc::new(IndexMap::new()),
      pipeline,
      resolver,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// A child logger under `self`'s dotted name, inheriting the bound
  /// context.
  pub fn child(&self, suffix: &str) -> Logger {
    let name = if self.name.is_empty() {
      suffix.to_string()
    } else {
      format!("{}.{}", self.name, suffix)
    };
    Logger {
      name: Arc::from(name.as_str()),
      bound: Arc::clone(&self.bound),
      pipeline: Arc::clone(&self.pipeline),
      resolver: Arc::clone(&self.resolver),
    }
  }

  /// A new logger with `fields` merged into the bound context. The
  /// original logger is untouched.
  pub fn bind(&self, fields: Vec<(String, Value)>) -> Logger {
    let mut bound = (*self.bound).clone();
    for (key, value) in fields {
      bound.insert(key, value);
    }
    Logger {
      name: Arc::clone(&self.name),
      bound: Arc::new(bound),
      pipeline: Arc::clone(&self.pipeline),
      resolver: Arc::clone(&self.resolver),
    }
  }

  pub fn bound_context(&self) -> &IndexMap<String, Value> {
    &self.bound
  }

  /// Whether a call at `level` would be dispatched. One hashmap lookup
  /// after warm-up.
  #[inline]
  pub fn enabled(&self, level: Level) -> bool {
    level >= self.resolver.effective(&self.name)
  }

  fn dispatch(&self, level: Level, message: &str, fields: Vec<(String, Value)>, exc_info: Option<ErrorChain>) {
    // Fast path: suppressed calls never construct an event.
    if !self.enabled(level) {
      crate::diag::global().record_level_drop();
      return;
    }
    let mut event = Event::new(level, self.name.as_ref(), message);
    // Bound first, call-site second: call-site values override bound.
    for (key, value) in self.bound.iter() {
      event.insert(key.clone(), value.clone());
    }
    for (key, value) in fields {
      event.insert(key, value);
    }
    event.exc_info = exc_info;
    self.pipeline.dispatch(event);
  }

  pub fn trace(&self, message: &str) {
    self.dispatch(Level::Trace, message, Vec::new(), None);
  }

  pub fn trace_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Trace, message, fields, None);
  }

  pub fn debug(&self, message: &str) {
    self.dispatch(Level::Debug, message, Vec::new(), None);
  }

  pub fn debug_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Debug, message, fields, None);
  }

  pub fn info(&self, message: &str) {
    self.dispatch(Level::Info, message, Vec::new(), None);
  }

  pub fn info_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Info, message, fields, None);
  }

  pub fn warning(&self, message: &str) {
    self.dispatch(Level::Warning, message, Vec::new(), None);
  }

  pub fn warning_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Warning, message, fields, None);
  }

  pub fn error(&self, message: &str) {
    self.dispatch(Level::Error, message, Vec::new(), None);
  }

  pub fn error_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Error, message, fields, None);
  }

  pub fn critical(&self, message: &str) {
    self.dispatch(Level::Critical, message, Vec::new(), None);
  }

  pub fn critical_with(&self, message: &str, fields: Vec<(String, Value)>) {
    self.dispatch(Level::Critical, message, fields, None);
  }

  /// Log at error level with the error's chain captured as `exc_info`.
  pub fn exception(&self, message: &str, err: &(dyn std::error::Error + 'static)) {
    self.dispatch(Level::Error, message, Vec::new(), Some(ErrorChain::capture(err)));
  }

  pub fn exception_with(
    &self,
    message: &str,
    err: &(dyn std::error::Error + 'static),
    fields: Vec<(String, Value)>,
  ) {
    self.dispatch(Level::Error, message, fields, Some(ErrorChain::capture(err)));
  }
}

impl std::fmt::Debug for Logger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Logger")
      .field("name", &self.name)
      .field("bound_keys", &self.bound.keys().collect::<Vec<_>>())
      .finish()
  }
}
