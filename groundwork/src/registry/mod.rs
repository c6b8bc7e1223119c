//! # Registry Module
//!
//! Thread-safe `(dimension, name)` → value store backing the hub: components,
//! commands, and event sets all live here, in separate dimensions.
//!
//! ## Semantics
//!
//! - `(dimension, name)` is unique; duplicate registration without
//!   `replace` fails with `AlreadyExists` and leaves no partial state
//! - Aliases are alternate names resolving to the same entry and share the
//!   name namespace within a dimension
//! - Iteration order within a dimension equals insertion order
//!
//! ## Concurrency
//!
//! One `RwLock` over the whole store. Reads are frequent, writes happen at
//! init time, so contention is negligible in steady state.

mod __test__;

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::errors::{FoundationError, Result};
use crate::value::Value;

/// Registered values are type-erased; use [`Registry::get_as`] to recover the
/// concrete type.
pub type ComponentValue = Arc<dyn Any + Send + Sync>;

/// Well-known dimension names.
pub const DIMENSION_COMPONENT: &str = "component";
pub const DIMENSION_COMMAND: &str = "command";
pub const DIMENSION_EVENT_SET: &str = "event_set";

/// A single registry entry. Cloning is cheap: the value is an `Arc`.
#[derive(Clone)]
pub struct Entry {
  pub dimension: String,
  pub name: String,
  pub value: ComponentValue,
  pub metadata: IndexMap<String, Value>,
  pub aliases: Vec<String>,
}

impl std::fmt::Debug for Entry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Entry")
      .field("dimension", &self.dimension)
      .field("name", &self.name)
      .field("metadata", &self.metadata)
      .field("aliases", &self.aliases)
      .finish()
  }
}

#[derive(Default)]
struct DimensionStore {
  /// Insertion-ordered primary entries.
  entries: IndexMap<String, Entry>,
  /// alias → primary name.
  aliases: HashMap<String, String>,
}

impl DimensionStore {
  fn name_taken(&self, name: &str) -> bool {
    self.entries.contains_key(name) || self.aliases.contains_key(name)
  }
}

#[derive(Default)]
pub struct Registry {
  inner: RwLock<IndexMap<String, DimensionStore>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `value` under `(dimension, name)`.
  ///
  /// With `replace = false`, an existing name or alias collision fails with
  /// `AlreadyExists`. With `replace = true`, an existing primary entry (and
  /// its aliases) is displaced. All validation happens before any mutation,
  /// so a failed call leaves the store untouched.
  pub fn register(
    &self,
    name: impl Into<String>,
    value: ComponentValue,
    dimension: impl Into<String>,
    metadata: Option<IndexMap<String, Value>>,
    aliases: Option<Vec<String>>,
    replace: bool,
  ) -> Result<()> {
    let name = name.into();
    let dimension = dimension.into();
    let aliases = aliases.unwrap_or_default();

    let mut inner = self.inner.write().expect("registry lock poisoned");
    let store = inner.entry(dimension.clone()).or_default();

    if !replace && store.name_taken(&name) {
      return Err(FoundationError::already_exists(&dimension, &name));
    }
    for alias in &aliases {
      if alias == &name {
        return Err(FoundationError::already_exists(&dimension, alias));
      }
      // An alias may not shadow any name or alias, except aliases of the
      // entry being replaced.
      let conflict = if store.entries.contains_key(alias) {
        true
      } else if let Some(primary) = store.aliases.get(alias) {
        !(replace && primary == &name)
      } else {
        false
      };
      if conflict {
        return Err(FoundationError::already_exists(&dimension, alias));
      }
    }

    // Displace the previous entry's aliases when replacing.
    if let Some(old) = store.entries.get(&name) {
      let old_aliases = old.aliases.clone();
      for alias in old_aliases {
        store.aliases.remove(&alias);
      }
    }

    for alias in &aliases {
      store.aliases.insert(alias.clone(), name.clone());
    }
    let entry = Entry {
      dimension: dimension.clone(),
      name: name.clone(),
      value,
      metadata: metadata.unwrap_or_default(),
      aliases,
    };
    store.entries.insert(name, entry);
    Ok(())
  }

  /// Resolve `name` (or an alias) within `dimension`.
  pub fn get(&self, name: &str, dimension: &str) -> Option<ComponentValue> {
    self.get_entry(name, dimension).map(|e| e.value)
  }

  /// Like [`Registry::get`] but returns the full entry.
  pub fn get_entry(&self, name: &str, dimension: &str) -> Option<Entry> {
    let inner = self.inner.read().expect("registry lock poisoned");
    let store = inner.get(dimension)?;
    let primary = store
      .aliases
      .get(name)
      .map(String::as_str)
      .unwrap_or(name);
    store.entries.get(primary).cloned()
  }

  /// Typed lookup; `None` when absent or when the stored value is a
  /// different type.
  pub fn get_as<T: Any + Send + Sync>(&self, name: &str, dimension: &str) -> Option<Arc<T>> {
    self.get(name, dimension).and_then(|v| v.downcast::<T>().ok())
  }

  /// Remove `(dimension, name)` and its aliases. Returns whether an entry
  /// was removed. Aliases are not accepted as removal keys.
  pub fn remove(&self, name: &str, dimension: &str) -> bool {
    let mut inner = self.inner.write().expect("registry lock poisoned");
    let Some(store) = inner.get_mut(dimension) else {
      return false;
    };
    match store.entries.shift_remove(name) {
      Some(entry) => {
        for alias in &entry.aliases {
          store.aliases.remove(alias);
        }
        true
      },
      None => false,
    }
  }

  /// Entries of one dimension (insertion order), or of all dimensions in
  /// dimension-registration order.
  pub fn list(&self, dimension: Option<&str>) -> Vec<Entry> {
    let inner = self.inner.read().expect("registry lock poisoned");
    match dimension {
      Some(dim) => inner
        .get(dim)
        .map(|store| store.entries.values().cloned().collect())
        .unwrap_or_default(),
      None => inner
        .values()
        .flat_map(|store| store.entries.values().cloned())
        .collect(),
    }
  }

  pub fn contains(&self, name: &str, dimension: &str) -> bool {
    let inner = self.inner.read().expect("registry lock poisoned");
    inner
      .get(dimension)
      .map(|store| store.name_taken(name))
      .unwrap_or(false)
  }

  /// Drop every entry in every dimension. Test-isolation support; called by
  /// the hub's `reset_for_testing`.
  pub fn clear(&self) {
    let mut inner = self.inner.write().expect("registry lock poisoned");
    inner.clear();
  }

  /// Number of entries in a dimension.
  pub fn len(&self, dimension: &str) -> usize {
    let inner = self.inner.read().expect("registry lock poisoned");
    inner.get(dimension).map(|s| s.entries.len()).unwrap_or(0)
  }

  pub fn is_empty(&self, dimension: &str) -> bool {
    self.len(dimension) == 0
  }
}
