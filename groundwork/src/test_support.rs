//! Shared test scaffolding. Only compiled for tests.

use std::sync::{Mutex, MutexGuard};

static HUB_GUARD: Mutex<()> = Mutex::new(());

/// Serializes every test that touches the process-wide hub singleton.
pub fn hub_guard() -> MutexGuard<'static, ()> {
  HUB_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
