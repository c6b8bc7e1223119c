//! # Error Taxonomy
//!
//! Every fallible operation in the crate returns a [`FoundationError`] (or a
//! small operation-specific enum that embeds the caller's error type, see
//! [`crate::retry::RetryError`] and [`crate::breaker::BreakerError`]).
//!
//! Propagation policy:
//! - Configuration and registration errors surface at hub init time.
//! - Logger hot-path errors never reach the caller; they are counted in
//!   [`crate::diag::Diagnostics`] and routed to stderr.
//! - Resilience errors propagate to their own caller unchanged.

mod __test__;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FoundationError {
  /// Registration collided with an existing name or alias.
  #[error("already exists: {dimension}/{name}")]
  AlreadyExists { dimension: String, name: String },

  /// Lookup or removal of an entry that is not registered.
  #[error("not found: {dimension}/{name}")]
  NotFound { dimension: String, name: String },

  /// A parsed environment variable or override failed validation.
  #[error("invalid configuration for {key}: {reason}")]
  InvalidConfiguration { key: String, reason: String },

  /// A step of hub initialization failed; the hub stays uninitialized.
  #[error("initialization failed: {0}")]
  InitializationFailure(String),

  /// The circuit breaker rejected the call without invoking the operation.
  #[error("circuit breaker '{name}' is open")]
  CircuitOpen { name: String },

  /// A rate limiter denied admission.
  #[error("rate limited: {name}")]
  RateLimited { name: String },

  /// A sink failed to write. Swallowed at the logger boundary by default.
  #[error("sink '{sink}' write failed")]
  SinkWrite {
    sink: String,
    #[source]
    source: std::io::Error,
  },

  /// CLI usage error (unknown command, bad arguments). Maps to exit code 2.
  #[error("usage: {0}")]
  Usage(String),

  /// A command handler failed. Maps to exit code 1.
  #[error("command '{command}' failed: {reason}")]
  CommandFailed { command: String, reason: String },
}

impl FoundationError {
  pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
    FoundationError::InvalidConfiguration {
      key: key.into(),
      reason: reason.into(),
    }
  }

  pub fn already_exists(dimension: impl Into<String>, name: impl Into<String>) -> Self {
    FoundationError::AlreadyExists {
      dimension: dimension.into(),
      name: name.into(),
    }
  }

  pub fn not_found(dimension: impl Into<String>, name: impl Into<String>) -> Self {
    FoundationError::NotFound {
      dimension: dimension.into(),
      name: name.into(),
    }
  }
}

pub type Result<T> = std::result::Result<T, FoundationError>;
