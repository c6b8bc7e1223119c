#[cfg(test)]
mod __test__ {

  use crate::errors::FoundationError;

  #[test]
  fn test_error_display_formats() {
    let err = FoundationError::already_exists("command", "db.migrate");
    assert_eq!(err.to_string(), "already exists: command/db.migrate");

    let err = FoundationError::not_found("component", "cache");
    assert_eq!(err.to_string(), "not found: component/cache");

    let err = FoundationError::invalid_config("GROUNDWORK_LOG_LEVEL", "unknown level 'loud'");
    assert_eq!(
      err.to_string(),
      "invalid configuration for GROUNDWORK_LOG_LEVEL: unknown level 'loud'"
    );
  }

  #[test]
  fn test_sink_write_carries_source() {
    use std::error::Error;

    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
    let err = FoundationError::SinkWrite {
      sink: "file".to_string(),
      source: io,
    };

    assert!(err.to_string().contains("'file'"));
    assert!(err.source().is_some());
  }

  #[test]
  fn test_circuit_open_names_breaker() {
    let err = FoundationError::CircuitOpen {
      name: "otlp".to_string(),
    };
    assert_eq!(err.to_string(), "circuit breaker 'otlp' is open");
  }
}
