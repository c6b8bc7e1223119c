#[cfg(test)]
mod __test__ {

  use std::sync::Arc;

  use crate::errors::FoundationError;
  use crate::registry::{Registry, DIMENSION_COMPONENT};

  fn boxed(v: &str) -> Arc<dyn std::any::Any + Send + Sync> {
    Arc::new(v.to_string())
  }

  #[test]
  fn test_register_and_get() {
    let registry = Registry::new();
    registry
      .register("cache", boxed("memcache"), DIMENSION_COMPONENT, None, None, false)
      .unwrap();

    let value = registry.get_as::<String>("cache", DIMENSION_COMPONENT).unwrap();
    assert_eq!(value.as_str(), "memcache");
    assert!(registry.contains("cache", DIMENSION_COMPONENT));
    assert!(!registry.contains("cache", "other_dimension"));
  }

  #[test]
  fn test_duplicate_registration_fails() {
    let registry = Registry::new();
    registry
      .register("cache", boxed("a"), DIMENSION_COMPONENT, None, None, false)
      .unwrap();

    let err = registry
      .register("cache", boxed("b"), DIMENSION_COMPONENT, None, None, false)
      .unwrap_err();
    assert!(matches!(err, FoundationError::AlreadyExists { .. }));

    // Original value survives the failed registration.
    let value = registry.get_as::<String>("cache", DIMENSION_COMPONENT).unwrap();
    assert_eq!(value.as_str(), "a");
  }

  #[test]
  fn test_replace_displaces_entry_and_aliases() {
    let registry = Registry::new();
    registry
      .register(
        "cache",
        boxed("a"),
        DIMENSION_COMPONENT,
        None,
        Some(vec!["memcache".to_string()]),
        false,
      )
      .unwrap();

    registry
      .register("cache", boxed("b"), DIMENSION_COMPONENT, None, None, true)
      .unwrap();

    let value = registry.get_as::<String>("cache", DIMENSION_COMPONENT).unwrap();
    assert_eq!(value.as_str(), "b");
    // The old alias no longer resolves.
    assert!(registry.get("memcache", DIMENSION_COMPONENT).is_none());
  }

  #[test]
  fn test_alias_resolution() {
    let registry = Registry::new();
    registry
      .register(
        "postgres",
        boxed("pg"),
        DIMENSION_COMPONENT,
        None,
        Some(vec!["pgsql".to_string(), "psql".to_string()]),
        false,
      )
      .unwrap();

    let via_alias = registry.get_as::<String>("psql", DIMENSION_COMPONENT).unwrap();
    assert_eq!(via_alias.as_str(), "pg");
    assert!(registry.contains("pgsql", DIMENSION_COMPONENT));
  }

  #[test]
  fn test_alias_conflict_fails_without_partial_state() {
    let registry = Registry::new();
    registry
      .register("a", boxed("a"), DIMENSION_COMPONENT, None, None, false)
      .unwrap();

    let err = registry
      .register(
        "b",
        boxed("b"),
        DIMENSION_COMPONENT,
        None,
        Some(vec!["a".to_string()]),
        false,
      )
      .unwrap_err();
    assert!(matches!(err, FoundationError::AlreadyExists { .. }));

    // The failed registration left nothing behind.
    assert!(!registry.contains("b", DIMENSION_COMPONENT));
  }

  #[test]
  fn test_iteration_order_is_insertion_order() {
    let registry = Registry::new();
    for name in ["first", "second", "third"] {
      registry
        .register(name, boxed(name), DIMENSION_COMPONENT, None, None, false)
        .unwrap();
    }

    let names: Vec<String> = registry
      .list(Some(DIMENSION_COMPONENT))
      .into_iter()
      .map(|e| e.name)
      .collect();
    assert_eq!(names, vec!["first", "second", "third"]);
  }

  #[test]
  fn test_remove_then_reregister() {
    let registry = Registry::new();
    registry
      .register(
        "cache",
        boxed("a"),
        DIMENSION_COMPONENT,
        None,
        Some(vec!["mc".to_string()]),
        false,
      )
      .unwrap();

    assert!(registry.remove("cache", DIMENSION_COMPONENT));
    assert!(!registry.remove("cache", DIMENSION_COMPONENT));
    assert!(registry.get("mc", DIMENSION_COMPONENT).is_none());

    // Round trip: the slot (and the alias) is free again.
    registry
      .register(
        "cache",
        boxed("b"),
        DIMENSION_COMPONENT,
        None,
        Some(vec!["mc".to_string()]),
        false,
      )
      .unwrap();
  }

  #[test]
  fn test_dimensions_are_isolated() {
    let registry = Registry::new();
    registry
      .register("same", boxed("component"), DIMENSION_COMPONENT, None, None, false)
      .unwrap();
    registry
      .register("same", boxed("command"), "command", None, None, false)
      .unwrap();

    assert_eq!(registry.len(DIMENSION_COMPONENT), 1);
    assert_eq!(registry.len("command"), 1);
  }

  #[test]
  fn test_clear() {
    let registry = Registry::new();
    registry
      .register("x", boxed("x"), DIMENSION_COMPONENT, None, None, false)
      .unwrap();
    registry.clear();
    assert!(registry.is_empty(DIMENSION_COMPONENT));
  }

  #[test]
  fn test_concurrent_reads_and_writes() {
    let registry = Arc::new(Registry::new());
    let mut handles = Vec::new();

    for t in 0..4 {
      let registry = Arc::clone(&registry);
      handles.push(std::thread::spawn(move || {
        for i in 0..50 {
          let name = format!("entry-{}-{}", t, i);
          registry
            .register(&name, Arc::new(i), DIMENSION_COMPONENT, None, None, false)
            .unwrap();
          assert!(registry.contains(&name, DIMENSION_COMPONENT));
        }
      }));
    }
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(registry.len(DIMENSION_COMPONENT), 200);
  }
}
