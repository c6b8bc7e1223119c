//! # Retry Executor
//!
//! Policy-driven retry with backoff, jitter, and classification of retryable
//! errors.
//!
//! ## Delay computation
//!
//! For attempt `n` (1-based): `fixed` → `base`, `linear` → `base × n`,
//! `exponential` → `base × 2^(n-1)`; clamped to `max_delay`, then scaled by
//! `1 - jitter/2 + rand() × jitter`. Jitter is applied after the clamp, so
//! the effective ceiling is `max_delay × (1 + jitter/2)`.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use groundwork::retry::{Backoff, RetryPolicy};
//!
//! let policy: RetryPolicy<std::io::Error> = RetryPolicy::builder()
//!   .max_attempts(4)
//!   .base_delay(Duration::from_millis(10))
//!   .max_delay(Duration::from_millis(80))
//!   .backoff(Backoff::Exponential)
//!   .jitter(0.2)
//!   .build()
//!   .expect("valid retry config");
//! # let _ = policy;
//! ```

mod __test__;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::errors::FoundationError;

/// Backoff strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
  Fixed,
  Linear,
  #[default]
  Exponential,
}

/// Outcome of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
  /// The error was classified non-retryable and propagates unchanged.
  #[error("{0}")]
  Permanent(E),
  /// Every attempt failed with a retryable error.
  #[error("retries exhausted after {attempts} attempts: {last_error}")]
  Exhausted { attempts: u32, last_error: E },
}

impl<E: fmt::Display> RetryError<E> {
  /// The underlying error, whichever way the retry ended.
  pub fn into_inner(self) -> E {
    match self {
      RetryError::Permanent(e) => e,
      RetryError::Exhausted { last_error, .. } => last_error,
    }
  }
}

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryObserver = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Immutable retry policy. Cloning shares the predicate and observer.
pub struct RetryPolicy<E> {
  max_attempts: u32,
  base_delay: Duration,
  max_delay: Duration,
  backoff: Backoff,
  jitter: f64,
  retryable: Predicate<E>,
  on_retry: Option<RetryObserver>,
}

impl<E> Clone for RetryPolicy<E> {
  fn clone(&self) -> Self {
    Self {
      max_attempts: self.max_attempts,
      base_delay: self.base_delay,
      max_delay: self.max_delay,
      backoff: self.backoff,
      jitter: self.jitter,
      retryable: Arc::clone(&self.retryable),
      on_retry: self.on_retry.clone(),
    }
  }
}

impl<E> fmt::Debug for RetryPolicy<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RetryPolicy")
      .field("max_attempts", &self.max_attempts)
      .field("base_delay", &self.base_delay)
      .field("max_delay", &self.max_delay)
      .field("backoff", &self.backoff)
      .field("jitter", &self.jitter)
      .finish()
  }
}

impl<E: fmt::Display> RetryPolicy<E> {
  pub fn builder() -> RetryPolicyBuilder<E> {
    RetryPolicyBuilder::default()
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Pre-jitter delay before attempt `attempt + 1`, after the failure of
  /// 1-based `attempt`. Pure; exposed for tests.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let raw = match self.backoff {
      Backoff::Fixed => self.base_delay,
      Backoff::Linear => self.base_delay.saturating_mul(attempt),
      Backoff::Exponential => self
        .base_delay
        .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX)),
    };
    raw.min(self.max_delay)
  }

  fn jittered(&self, delay: Duration) -> Duration {
    if self.jitter == 0.0 {
      return delay;
    }
    let roll: f64 = rand::rng().random::<f64>();
    let factor = 1.0 - self.jitter / 2.0 + roll * self.jitter;
    delay.mul_f64(factor)
  }

  /// Run `op` to completion, blocking the calling thread between attempts.
  ///
  /// `op` receives the 1-based attempt number. Non-retryable errors
  /// propagate unchanged as `RetryError::Permanent`.
  pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T, E>) -> Result<T, RetryError<E>> {
    for attempt in 1..=self.max_attempts {
      match op(attempt) {
        Ok(value) => return Ok(value),
        Err(err) if attempt == self.max_attempts => {
          return Err(self.classify_final(err, attempt));
        },
        Err(err) => {
          if !(self.retryable)(&err) {
            return Err(RetryError::Permanent(err));
          }
          let delay = self.jittered(self.delay_for(attempt));
          if let Some(observer) = &self.on_retry {
            observer(attempt, delay);
          }
          std::thread::sleep(delay);
        },
      }
    }
    unreachable!("max_attempts >= 1 is enforced by the builder")
  }

  /// Async variant. Suspends via `tokio::time::sleep`; dropping the future
  /// during a suspension cancels the retry without running further
  /// attempts.
  pub async fn run_async<T, Fut>(
    &self,
    mut op: impl FnMut(u32) -> Fut,
  ) -> Result<T, RetryError<E>>
  where
    Fut: std::future::Future<Output = Result<T, E>>,
  {
    for attempt in 1..=self.max_attempts {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) if attempt == self.max_attempts => {
          return Err(self.classify_final(err, attempt));
        },
        Err(err) => {
          if !(self.retryable)(&err) {
            return Err(RetryError::Permanent(err));
          }
          let delay = self.jittered(self.delay_for(attempt));
          if let Some(observer) = &self.on_retry {
            observer(attempt, delay);
          }
          tokio::time::sleep(delay).await;
        },
      }
    }
    unreachable!("max_attempts >= 1 is enforced by the builder")
  }

  fn classify_final(&self, err: E, attempts: u32) -> RetryError<E> {
    if (self.retryable)(&err) {
      RetryError::Exhausted {
        attempts,
        last_error: err,
      }
    } else {
      RetryError::Permanent(err)
    }
  }
}

/// Builder with validation: `max_attempts ≥ 1`, `jitter ∈ [0, 1]`,
/// `max_delay ≥ base_delay`.
pub struct RetryPolicyBuilder<E> {
  max_attempts: u32,
  base_delay: Duration,
  max_delay: Option<Duration>,
  backoff: Backoff,
  jitter: f64,
  retryable: Predicate<E>,
  on_retry: Option<RetryObserver>,
}

impl<E> Default for RetryPolicyBuilder<E> {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_millis(100),
      max_delay: None,
      backoff: Backoff::Exponential,
      jitter: 0.0,
      retryable: Arc::new(|_| true),
      on_retry: None,
    }
  }
}

impl<E: fmt::Display> RetryPolicyBuilder<E> {
  pub fn max_attempts(mut self, attempts: u32) -> Self {
    self.max_attempts = attempts;
    self
  }

  pub fn base_delay(mut self, delay: Duration) -> Self {
    self.base_delay = delay;
    self
  }

  pub fn max_delay(mut self, delay: Duration) -> Self {
    self.max_delay = Some(delay);
    self
  }

  pub fn backoff(mut self, backoff: Backoff) -> Self {
    self.backoff = backoff;
    self
  }

  pub fn jitter(mut self, jitter: f64) -> Self {
    self.jitter = jitter;
    self
  }

  /// Classify which errors are worth retrying. Defaults to all.
  pub fn retryable_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
    self.retryable = Arc::new(predicate);
    self
  }

  /// Observe each scheduled retry `(attempt, delay)`; used by telemetry and
  /// tests.
  pub fn on_retry(mut self, observer: impl Fn(u32, Duration) + Send + Sync + 'static) -> Self {
    self.on_retry = Some(Arc::new(observer));
    self
  }

  pub fn build(self) -> Result<RetryPolicy<E>, FoundationError> {
    if self.max_attempts < 1 {
      return Err(FoundationError::invalid_config(
        "retry.max_attempts",
        "must be >= 1",
      ));
    }
    if !(0.0..=1.0).contains(&self.jitter) {
      return Err(FoundationError::invalid_config(
        "retry.jitter",
        format!("must be within [0, 1], got {}", self.jitter),
      ));
    }
    let max_delay = self.max_delay.unwrap_or(self.base_delay.saturating_mul(32));
    if max_delay < self.base_delay {
      return Err(FoundationError::invalid_config(
        "retry.max_delay",
        "must be >= base_delay",
      ));
    }
    Ok(RetryPolicy {
      max_attempts: self.max_attempts,
      base_delay: self.base_delay,
      max_delay,
      backoff: self.backoff,
      jitter: self.jitter,
      retryable: self.retryable,
      on_retry: self.on_retry,
    })
  }
}
