//! # Pipeline
//!
//! The assembled logging path: processor chain → formatter → sinks. Built
//! once by the hub from the active context; loggers hold an `Arc` to it.
//!
//! Dispatch is hot-path code with a hard guarantee: it never panics or
//! errors into the caller. A logging subsystem that throws from
//! `logger.info` is broken, so every failure is swallowed, counted, and
//! reported on stderr.


use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::diag;
use crate::event::Event;
use crate::processor::ProcessorChain;
use crate::render::{Formatter, LineBuffer};
use crate::sink::Sink;

pub struct Pipeline {
  chain: ProcessorChain,
  formatter: Arc<dyn Formatter>,
  sinks: Vec<Arc<dyn Sink>>,
}

impl Pipeline {
  pub fn new(chain: ProcessorChain, formatter: Arc<dyn Formatter>, sinks: Vec<Arc<dyn Sink>>) -> Self {
    Self {
      chain,
      formatter,
      sinks,
    }
  }

  /// Run the event through the chain, render, and write to every sink.
  pub fn dispatch(&self, event: Event) {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.dispatch_inner(event)));
    if outcome.is_err() {
      diag::global().record_hot_path_error();
      eprintln!("[Pipeline] dispatch panicked; event lost");
    }
  }

  fn dispatch_inner(&self, event: Event) {
    let Some(event) = self.chain.run(event) else {
      // Intentional DROP; the responsible processor already counted it.
      return;
    };

    let mut out = LineBuffer::new();
    let degraded = self.formatter.format(&event, &mut out);
    diag::global().record_serialization_errors(degraded as u64);
    let _ = out.write_all(b"\n");

    for sink in &self.sinks {
      sink.write(out.as_slice());
    }
    diag::global().record_emitted();
  }

  pub fn formatter(&self) -> &Arc<dyn Formatter> {
    &self.formatter
  }

  pub fn sinks(&self) -> &[Arc<dyn Sink>] {
    &self.sinks
  }

  pub fn stages(&self) -> Vec<&'static str> {
    self.chain.stages()
  }

  /// Flush every sink.
  pub fn flush_all(&self) {
    for sink in &self.sinks {
      sink.flush();
    }
  }

  /// Flush, then close, every sink. Idempotent because sinks are.
  pub fn shutdown(&self) {
    for sink in &self.sinks {
      sink.flush();
    }
    for sink in &self.sinks {
      sink.close();
    }
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.stages())
      .field("formatter", &self.formatter.name())
      .field("sinks", &self.sinks.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
      .finish()
  }
}
