//! # Tracing Bridge
//!
//! A `tracing_subscriber::Layer` that forwards `tracing` events into the
//! foundation pipeline, so code instrumented with `tracing::info!` and
//! friends flows through the same processors, enrichment, and sinks as
//! native logger calls.
//!
//! The bridge resolves the active hub state per event, which keeps it
//! correct across `reset_for_testing` and forced re-initialization.

mod __test__;

use tracing::field::{Field, Visit};
use tracing::{Event as TracingEvent, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

use crate::event::Level;
use crate::value::Value;

/// Map a `tracing` level onto the foundation's scale. `tracing` has no
/// critical level.
pub fn level_from_tracing(level: &tracing::Level) -> Level {
  match *level {
    tracing::Level::TRACE => Level::Trace,
    tracing::Level::DEBUG => Level::Debug,
    tracing::Level::INFO => Level::Info,
    tracing::Level::WARN => Level::Warning,
    tracing::Level::ERROR => Level::Error,
  }
}

/// Collects the message and primitive fields of one tracing event.
#[derive(Default)]
struct FieldVisitor {
  message: Option<String>,
  fields: Vec<(String, Value)>,
}

impl Visit for FieldVisitor {
  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    if field.name() == "message" {
      self.message = Some(format!("{:?}", value));
    } else {
      self
        .fields
        .push((field.name().to_string(), Value::from(format!("{:?}", value))));
    }
  }

  fn record_str(&mut self, field: &Field, value: &str) {
    if field.name() == "message" {
      self.message = Some(value.to_string());
    } else {
      self.fields.push((field.name().to_string(), Value::from(value)));
    }
  }

  fn record_i64(&mut self, field: &Field, value: i64) {
    self.fields.push((field.name().to_string(), Value::Int(value)));
  }

  fn record_u64(&mut self, field: &Field, value: u64) {
    self.fields.push((field.name().to_string(), Value::from(value)));
  }

  fn record_f64(&mut self, field: &Field, value: f64) {
    self.fields.push((field.name().to_string(), Value::Float(value)));
  }

  fn record_bool(&mut self, field: &Field, value: bool) {
    self.fields.push((field.name().to_string(), Value::Bool(value)));
  }
}

/// The bridging layer. Zero-sized; all state lives in the hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBridge;

impl TracingBridge {
  pub fn new() -> Self {
    Self
  }

  /// Install the bridge as the global tracing subscriber. Keeps whatever
  /// subscriber is already set (first installation wins, matching
  /// `tracing`'s own semantics).
  pub fn install() {
    let subscriber = tracing_subscriber::registry().with(TracingBridge::new());
    let _ = tracing::subscriber::set_global_default(subscriber);
  }
}

impl<S> Layer<S> for TracingBridge
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  fn on_event(&self, event: &TracingEvent<'_>, _ctx: Context<'_, S>) {
    let metadata = event.metadata();
    let level = level_from_tracing(metadata.level());
    let logger = crate::hub::global().get_logger(metadata.target());

    // Fast path before visiting fields.
    if !logger.enabled(level) {
      crate::diag::global().record_level_drop();
      return;
    }

    let mut visitor = FieldVisitor::default();
    event.record(&mut visitor);
    let message = visitor.message.unwrap_or_default();

    match level {
      Level::Trace => logger.trace_with(&message, visitor.fields),
      Level::Debug => logger.debug_with(&message, visitor.fields),
      Level::Info => logger.info_with(&message, visitor.fields),
      Level::Warning => logger.warning_with(&message, visitor.fields),
      Level::Error => logger.error_with(&message, visitor.fields),
      Level::Critical => logger.critical_with(&message, visitor.fields),
    }
  }
}
