//! # Processor Chain
//!
//! Ordered pipeline of event transforms. A processor is a pure function
//! `Event → Option<Event>`; `None` means DROP — the pipeline intentionally
//! suppressed the event, which is observable in
//! [`crate::diag::Diagnostics`], never an error.
//!
//! The standard composition, in order:
//!
//! 1. [`InjectBaseContext`] — service/host/pid fields, timestamp
//! 2. (bound + call-site merge happens logger-side, before dispatch)
//! 3. [`FilterByLevel`] — effective-level suppression
//! 4. [`ResolveEventSets`] — markers, overlays, field transforms
//! 5. [`SanitizeSensitive`] — pattern redaction, overriding event sets
//! 6. [`ApplyRateLimit`] — per-logger-name token buckets
//! 7. [`FormatException`] — error-chain fields
//!
//! Rendering is the terminal step and lives in [`crate::render`].


use std::sync::Arc;

use crate::diag;
use crate::event::Event;
use crate::eventset::EventSetCatalog;
use crate::logger::LevelResolver;
use crate::ratelimit::RateLimiterMap;
use crate::render::MARKERS_FIELD;
use crate::value::Value;

/// One pipeline stage.
pub trait Processor: Send + Sync + 'static {
  fn name(&self) -> &'static str;
  /// Transform the event or drop it (`None`).
  fn process(&self, event: Event) -> Option<Event>;
}

/// Ordered processor composition.
#[derive(Default)]
pub struct ProcessorChain {
  processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
  pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
    Self { processors }
  }

  pub fn push(&mut self, processor: Arc<dyn Processor>) {
    self.processors.push(processor);
  }

  /// Run the event through every stage in order; `None` as soon as any
  /// stage drops.
  pub fn run(&self, event: Event) -> Option<Event> {
    let mut current = event;
    for processor in &self.processors {
      current = processor.process(current)?;
    }
    Some(current)
  }

  pub fn stages(&self) -> Vec<&'static str> {
    self.processors.iter().map(|p| p.name()).collect()
  }
}

/// Attach process-wide fields and stamp the timestamp.
pub struct InjectBaseContext {
  pub service_name: String,
  pub environment: String,
  pub host: String,
  pub pid: u32,
  pub omit_timestamp: bool,
}

impl InjectBaseContext {
  pub fn from_context(ctx: &crate::context::FoundationContext) -> Self {
    Self {
      service_name: ctx.service_name.clone(),
      environment: ctx.environment.clone(),
      host: crate::util::current_hostname(),
      pid: crate::util::current_pid(),
      omit_timestamp: ctx.omit_timestamp,
    }
  }
}

impl Processor for InjectBaseContext {
  fn name(&self) -> &'static str {
    "inject_base_context"
  }

  fn process(&self, mut event: Event) -> Option<Event> {
    if !self.omit_timestamp && event.timestamp.is_none() {
      event.timestamp = Some(chrono::Utc::now());
    }
    // Base fields never override bound or call-site values.
    event.insert_missing("service", Value::from(self.service_name.as_str()));
    event.insert_missing("environment", Value::from(self.environment.as_str()));
    event.insert_missing("host", Value::from(self.host.as_str()));
    event.insert_missing("pid", Value::from(self.pid));
    Some(event)
  }
}

/// Drop events below the effective level of their logger name.
pub struct FilterByLevel {
  pub resolver: Arc<LevelResolver>,
}

impl Processor for FilterByLevel {
  fn name(&self) -> &'static str {
    "filter_by_level"
  }

  fn process(&self, event: Event) -> Option<Event> {
    if event.level < self.resolver.effective(&event.logger_name) {
      diag::global().record_level_drop();
      return None;
    }
    Some(event)
  }
}

/// Consult the event-set catalog: attach markers, merge overlays, apply
/// field transforms.
pub struct ResolveEventSets {
  pub catalog: EventSetCatalog,
  pub emoji_enabled: bool,
}

impl Processor for ResolveEventSets {
  fn name(&self) -> &'static str {
    "resolve_event_sets"
  }

  fn process(&self, mut event: Event) -> Option<Event> {
    let enrichment = self.catalog.resolve(&event);
    if enrichment.is_empty() {
      return Some(event);
    }

    for (key, value) in enrichment.overlay {
      event.insert(key, value);
    }
    for (field, transform) in &enrichment.transforms {
      if let Some(current) = event.get(field) {
        let replaced = transform.apply(current);
        event.insert(field.clone(), replaced);
      }
    }
    if self.emoji_enabled && !enrichment.markers.is_empty() {
      event.insert(
        MARKERS_FIELD,
        Value::List(enrichment.markers.into_iter().map(Value::String).collect()),
      );
    }
    Some(event)
  }
}

/// Redact any field whose key matches a configured pattern
/// (case-insensitive substring). Runs after event sets, so an event-set
/// `Keep` cannot exempt a sensitive key.
pub struct SanitizeSensitive {
  patterns: Vec<String>,
}

impl SanitizeSensitive {
  pub fn new(patterns: &[String]) -> Self {
    Self {
      patterns: patterns.iter().map(|p| p.to_ascii_lowercase()).collect(),
    }
  }

  fn is_sensitive(&self, key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    self.patterns.iter().any(|p| key.contains(p.as_str()))
  }
}

impl Processor for SanitizeSensitive {
  fn name(&self) -> &'static str {
    "sanitize_sensitive"
  }

  fn process(&self, mut event: Event) -> Option<Event> {
    let sensitive: Vec<String> = event
      .fields
      .keys()
      .filter(|k| self.is_sensitive(k))
      .cloned()
      .collect();
    for key in sensitive {
      event.insert(key, Value::String(crate::eventset::REDACTED.to_string()));
    }
    Some(event)
  }
}

/// Consult the per-logger-name rate limiter, if one is attached.
pub struct ApplyRateLimit {
  pub limiters: Arc<RateLimiterMap>,
}

impl Processor for ApplyRateLimit {
  fn name(&self) -> &'static str {
    "apply_rate_limit"
  }

  fn process(&self, event: Event) -> Option<Event> {
    if let Some(limiter) = self.limiters.get(&event.logger_name) {
      if !limiter.try_acquire(1.0) {
        diag::global().record_rate_limit_drop();
        return None;
      }
    }
    Some(event)
  }
}

/// Render a captured error chain into plain fields.
pub struct FormatException;

impl Processor for FormatException {
  fn name(&self) -> &'static str {
    "format_exception"
  }

  fn process(&self, mut event: Event) -> Option<Event> {
    if let Some(chain) = event.exc_info.take() {
      event.insert("error", Value::from(chain.message()));
      if chain.messages.len() > 1 {
        event.insert(
          "error_chain",
          Value::List(chain.messages.iter().cloned().map(Value::String).collect()),
        );
      }
    }
    Some(event)
  }
}
