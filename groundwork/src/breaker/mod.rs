//! # Circuit Breaker
//!
//! Failure-count state machine guarding an unreliable operation.
//!
//! ## States
//!
//! - `closed`: calls pass through; consecutive failures reaching
//!   `failure_threshold` trip the breaker to `open`
//! - `open`: calls are rejected with `CircuitOpen` until `recovery_timeout`
//!   has elapsed, then the breaker moves to `half_open`
//! - `half_open`: up to `half_open_probe_count` probe calls are admitted;
//!   any failure re-opens the breaker, `half_open_probe_count` consecutive
//!   successes close it
//!
//! State transitions are atomic; probe admission cannot over-admit under
//! concurrency. Time is read from an injected [`Clock`] so recovery can be
//! driven deterministically in tests.


use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::errors::{FoundationError, Result};
use crate::ratelimit::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
  Closed,
  Open,
  HalfOpen,
}

impl fmt::Display for CircuitState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      CircuitState::Closed => "closed",
      CircuitState::Open => "open",
      CircuitState::HalfOpen => "half_open",
    };
    f.write_str(s)
  }
}

/// Error surface of a guarded call.
#[derive(Debug, Error)]
pub enum BreakerError<E: fmt::Display> {
  /// Rejected without invoking the operation.
  #[error("circuit breaker '{name}' is open")]
  Open { name: String },
  /// The operation ran and failed; counted against the breaker.
  #[error("{0}")]
  Inner(E),
}

/// Breaker configuration; build via [`CircuitBreakerConfig::builder`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
  pub name: String,
  pub failure_threshold: u32,
  pub recovery_timeout: Duration,
  pub half_open_probe_count: u32,
}

impl CircuitBreakerConfig {
  pub fn builder() -> CircuitBreakerConfigBuilder {
    CircuitBreakerConfigBuilder::default()
  }
}

pub struct CircuitBreakerConfigBuilder {
  name: String,
  failure_threshold: u32,
  recovery_timeout: Duration,
  half_open_probe_count: u32,
}

impl Default for CircuitBreakerConfigBuilder {
  fn default() -> Self {
    Self {
      name: "default".to_string(),
      failure_threshold: 5,
      recovery_timeout: Duration::from_secs(30),
      half_open_probe_count: 1,
    }
  }
}

impl CircuitBreakerConfigBuilder {
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn failure_threshold(mut self, threshold: u32) -> Self {
    self.failure_threshold = threshold;
    self
  }

  pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
    self.recovery_timeout = timeout;
    self
  }

  pub fn half_open_probe_count(mut self, probes: u32) -> Self {
    self.half_open_probe_count = probes;
    self
  }

  pub fn build(self) -> Result<CircuitBreakerConfig> {
    if self.failure_threshold == 0 {
      return Err(FoundationError::invalid_config(
        "breaker.failure_threshold",
        "must be >= 1",
      ));
    }
    if self.half_open_probe_count == 0 {
      return Err(FoundationError::invalid_config(
        "breaker.half_open_probe_count",
        "must be >= 1",
      ));
    }
    Ok(CircuitBreakerConfig {
      name: self.name,
      failure_threshold: self.failure_threshold,
      recovery_timeout: self.recovery_timeout,
      half_open_probe_count: self.half_open_probe_count,
    })
  }
}

#[derive(Debug)]
struct BreakerInner {
  state: CircuitState,
  failure_count: u32,
  consecutive_successes: u32,
  probes_in_flight: u32,
  opened_at: Duration,
}

pub struct CircuitBreaker {
  config: CircuitBreakerConfig,
  clock: Arc<dyn Clock>,
  inner: Mutex<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CircuitBreaker")
      .field("config", &self.config)
      .field("state", &self.state())
      .finish()
  }
}

impl CircuitBreaker {
  pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
    Self {
      config,
      clock,
      inner: Mutex::new(BreakerInner {
        state: CircuitState::Closed,
        failure_count: 0,
        consecutive_successes: 0,
        probes_in_flight: 0,
        opened_at: Duration::ZERO,
      }),
    }
  }

  pub fn with_system_clock(config: CircuitBreakerConfig) -> Self {
    Self::new(config, Arc::new(SystemClock))
  }

  pub fn name(&self) -> &str {
    &self.config.name
  }

  /// Current state, advancing `open → half_open` when the recovery timeout
  /// has elapsed.
  pub fn state(&self) -> CircuitState {
    let mut inner = self.inner.lock().expect("breaker lock poisoned");
    self.advance(&mut inner);
    inner.state
  }

  fn advance(&self, inner: &mut BreakerInner) {
    if inner.state == CircuitState::Open {
      let now = self.clock.now();
      if now.saturating_sub(inner.opened_at) >= self.config.recovery_timeout {
        inner.state = CircuitState::HalfOpen;
        inner.probes_in_flight = 0;
        inner.consecutive_successes = 0;
      }
    }
  }

  /// Admit or reject the next call. Admission in `half_open` reserves one
  /// probe slot.
  fn try_admit(&self) -> std::result::Result<(), ()> {
    let mut inner = self.inner.lock().expect("breaker lock poisoned");
    self.advance(&mut inner);
    match inner.state {
      CircuitState::Closed => Ok(()),
      CircuitState::Open => Err(()),
      CircuitState::HalfOpen => {
        if inner.probes_in_flight < self.config.half_open_probe_count {
          inner.probes_in_flight += 1;
          Ok(())
        } else {
          Err(())
        }
      },
    }
  }

  fn record_success(&self) {
    let mut inner = self.inner.lock().expect("breaker lock poisoned");
    match inner.state {
      CircuitState::Closed => {
        inner.failure_count = 0;
      },
      CircuitState::HalfOpen => {
        inner.consecutive_successes += 1;
        if inner.consecutive_successes >= self.config.half_open_probe_count {
          inner.state = CircuitState::Closed;
          inner.failure_count = 0;
          inner.consecutive_successes = 0;
          inner.probes_in_flight = 0;
        }
      },
      CircuitState::Open => {},
    }
  }

  fn record_failure(&self) {
    let mut inner = self.inner.lock().expect("breaker lock poisoned");
    match inner.state {
      CircuitState::Closed => {
        inner.failure_count += 1;
        if inner.failure_count >= self.config.failure_threshold {
          inner.state = CircuitState::Open;
          inner.opened_at = self.clock.now();
        }
      },
      CircuitState::HalfOpen => {
        // Any probe failure re-opens with a fresh recovery window.
        inner.state = CircuitState::Open;
        inner.opened_at = self.clock.now();
        inner.probes_in_flight = 0;
        inner.consecutive_successes = 0;
      },
      CircuitState::Open => {},
    }
  }

  /// Guard a blocking operation.
  pub fn call<T, E: fmt::Display>(
    &self,
    op: impl FnOnce() -> std::result::Result<T, E>,
  ) -> std::result::Result<T, BreakerError<E>> {
    if self.try_admit().is_err() {
      return Err(BreakerError::Open {
        name: self.config.name.clone(),
      });
    }
    match op() {
      Ok(value) => {
        self.record_success();
        Ok(value)
      },
      Err(err) => {
        self.record_failure();
        Err(BreakerError::Inner(err))
      },
    }
  }

  /// Guard an async operation. The admission slot is released by the
  /// success/failure recording exactly as in the blocking path.
  pub async fn call_async<T, E, Fut>(&self, fut: Fut) -> std::result::Result<T, BreakerError<E>>
  where
    E: fmt::Display,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
  {
    if self.try_admit().is_err() {
      return Err(BreakerError::Open {
        name: self.config.name.clone(),
      });
    }
    match fut.await {
      Ok(value) => {
        self.record_success();
        Ok(value)
      },
      Err(err) => {
        self.record_failure();
        Err(BreakerError::Inner(err))
      },
    }
  }
}
