//! # Rate Limiter Module
//!
//! Token-bucket admission control with an injectable monotonic time source.
//!
//! ## Semantics
//!
//! `try_acquire` lazily refills `tokens = min(capacity, tokens + elapsed ×
//! refill_rate)` before testing `tokens ≥ cost`. The clock must be monotonic;
//! a zero or tiny backward jump is treated as "no elapsed time" rather than
//! an error. Acquisition is atomic: concurrent callers never observe an
//! inconsistent token count.

mod __test__;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::errors::{FoundationError, Result};
use crate::util::fnv1a_hash;

/// Monotonic time source. `now` is an offset from an arbitrary fixed epoch.
pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> Duration;
}

static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Wall clock backed by `Instant`, anchored at first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Duration {
    PROCESS_EPOCH.elapsed()
  }
}

/// Hand-cranked clock for tests and chaos injection.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: Mutex<Duration>,
}

impl ManualClock {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().expect("clock lock poisoned");
    *now += by;
  }

  pub fn set(&self, to: Duration) {
    let mut now = self.now.lock().expect("clock lock poisoned");
    *now = to;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Duration {
    *self.now.lock().expect("clock lock poisoned")
  }
}

#[derive(Debug)]
struct BucketState {
  tokens: f64,
  last_refill: Duration,
}

/// Token bucket: `capacity > 0` tokens, refilled at `refill_rate` tokens per
/// second.
pub struct TokenBucket {
  capacity: f64,
  refill_rate: f64,
  clock: Arc<dyn Clock>,
  state: Mutex<BucketState>,
}

impl std::fmt::Debug for TokenBucket {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenBucket")
      .field("capacity", &self.capacity)
      .field("refill_rate", &self.refill_rate)
      .finish()
  }
}

impl TokenBucket {
  /// A bucket starts full.
  pub fn new(capacity: f64, refill_rate: f64, clock: Arc<dyn Clock>) -> Result<Self> {
    if !(capacity > 0.0) {
      return Err(FoundationError::invalid_config(
        "rate_limit.capacity",
        format!("must be > 0, got {}", capacity),
      ));
    }
    if !(refill_rate > 0.0) {
      return Err(FoundationError::invalid_config(
        "rate_limit.refill_rate",
        format!("must be > 0, got {}", refill_rate),
      ));
    }
    let now = clock.now();
    Ok(Self {
      capacity,
      refill_rate,
      clock,
      state: Mutex::new(BucketState {
        tokens: capacity,
        last_refill: now,
      }),
    })
  }

  pub fn with_system_clock(capacity: f64, refill_rate: f64) -> Result<Self> {
    Self::new(capacity, refill_rate, Arc::new(SystemClock))
  }

  fn refill(&self, state: &mut BucketState) {
    let now = self.clock.now();
    // Backward jumps count as zero elapsed time.
    let elapsed = now.saturating_sub(state.last_refill);
    if elapsed > Duration::ZERO {
      let replenished = elapsed.as_secs_f64() * self.refill_rate;
      state.tokens = (state.tokens + replenished).min(self.capacity);
    }
    state.last_refill = state.last_refill.max(now);
  }

  /// Refill, then admit iff `tokens ≥ cost`.
  pub fn try_acquire(&self, cost: f64) -> bool {
    let mut state = self.state.lock().expect("bucket lock poisoned");
    self.refill(&mut state);
    if state.tokens >= cost {
      state.tokens -= cost;
      true
    } else {
      false
    }
  }

  /// Current token count after a refill pass.
  pub fn available_tokens(&self) -> f64 {
    let mut state = self.state.lock().expect("bucket lock poisoned");
    self.refill(&mut state);
    state.tokens
  }

  pub fn capacity(&self) -> f64 {
    self.capacity
  }
}

const SHARD_COUNT: usize = 16;

/// Sharded `logger_name → TokenBucket` map. Lookup hashes the name with the
/// crate FNV helper and locks only one shard.
pub struct RateLimiterMap {
  shards: Vec<Mutex<HashMap<String, Arc<TokenBucket>>>>,
}

impl Default for RateLimiterMap {
  fn default() -> Self {
    Self::new()
  }
}

impl RateLimiterMap {
  pub fn new() -> Self {
    Self {
      shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
    }
  }

  fn shard(&self, name: &str) -> &Mutex<HashMap<String, Arc<TokenBucket>>> {
    let index = (fnv1a_hash(name) as usize) % SHARD_COUNT;
    &self.shards[index]
  }

  /// Attach a limiter to a logger name, replacing any existing one.
  pub fn attach(&self, name: impl Into<String>, bucket: TokenBucket) {
    let name = name.into();
    let mut shard = self.shard(&name).lock().expect("limiter shard poisoned");
    shard.insert(name, Arc::new(bucket));
  }

  pub fn get(&self, name: &str) -> Option<Arc<TokenBucket>> {
    let shard = self.shard(name).lock().expect("limiter shard poisoned");
    shard.get(name).cloned()
  }

  pub fn detach(&self, name: &str) -> bool {
    let mut shard = self.shard(name).lock().expect("limiter shard poisoned");
    shard.remove(name).is_some()
  }

  pub fn is_empty(&self) -> bool {
    self.shards.iter().all(|s| s.lock().expect("limiter shard poisoned").is_empty())
  }
}
