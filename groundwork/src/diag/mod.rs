//! # Diagnostics
//!
//! Process-wide counters for pipeline self-observation. Everything the
//! pipeline intentionally suppresses (level filtering, rate limiting) or
//! swallows (sink errors, hot-path failures) must be visible here — DROP is
//! distinct from failure, and both are countable.
//!
//! All counters are lock-free `AtomicU64`s with relaxed ordering; updates on
//! the hot path cost one atomic add.


use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct Diagnostics {
  /// Events suppressed by level filtering.
  pub dropped_by_level: AtomicU64,
  /// Events suppressed by a rate limiter.
  pub dropped_by_rate_limit: AtomicU64,
  /// Events that reached a sink.
  pub events_emitted: AtomicU64,
  /// Values that could not be serialized faithfully.
  pub serialization_errors: AtomicU64,
  /// Sink write/flush failures (swallowed at the caller boundary).
  pub sink_errors: AtomicU64,
  /// Events dropped because an async sink queue was full.
  pub async_queue_drops: AtomicU64,
  /// Pipeline failures captured on the logging hot path.
  pub hot_path_errors: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
  pub dropped_by_level: u64,
  pub dropped_by_rate_limit: u64,
  pub events_emitted: u64,
  pub serialization_errors: u64,
  pub sink_errors: u64,
  pub async_queue_drops: u64,
  pub hot_path_errors: u64,
}

impl Diagnostics {
  #[inline]
  pub fn record_level_drop(&self) {
    self.dropped_by_level.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_rate_limit_drop(&self) {
    self.dropped_by_rate_limit.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_emitted(&self) {
    self.events_emitted.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_serialization_errors(&self, count: u64) {
    if count > 0 {
      self.serialization_errors.fetch_add(count, Ordering::Relaxed);
    }
  }

  #[inline]
  pub fn record_sink_error(&self) {
    self.sink_errors.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_async_queue_drop(&self) {
    self.async_queue_drops.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_hot_path_error(&self) {
    self.hot_path_errors.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> DiagnosticsSnapshot {
    DiagnosticsSnapshot {
      dropped_by_level: self.dropped_by_level.load(Ordering::Relaxed),
      dropped_by_rate_limit: self.dropped_by_rate_limit.load(Ordering::Relaxed),
      events_emitted: self.events_emitted.load(Ordering::Relaxed),
      serialization_errors: self.serialization_errors.load(Ordering::Relaxed),
      sink_errors: self.sink_errors.load(Ordering::Relaxed),
      async_queue_drops: self.async_queue_drops.load(Ordering::Relaxed),
      hot_path_errors: self.hot_path_errors.load(Ordering::Relaxed),
    }
  }

  /// Zero every counter. Test-isolation support.
  pub fn reset(&self) {
    self.dropped_by_level.store(0, Ordering::Relaxed);
    self.dropped_by_rate_limit.store(0, Ordering::Relaxed);
    self.events_emitted.store(0, Ordering::Relaxed);
    self.serialization_errors.store(0, Ordering::Relaxed);
    self.sink_errors.store(0, Ordering::Relaxed);
    self.async_queue_drops.store(0, Ordering::Relaxed);
    self.hot_path_errors.store(0, Ordering::Relaxed);
  }
}

static GLOBAL: Lazy<Diagnostics> = Lazy::new(Diagnostics::default);

/// The process-wide diagnostics instance.
pub fn global() -> &'static Diagnostics {
  &GLOBAL
}
