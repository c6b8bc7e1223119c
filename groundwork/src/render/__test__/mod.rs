#[cfg(test)]
mod __test__ {

  use chrono::{TimeZone, Utc};

  use crate::event::{Event, Level};
  use crate::render::{Formatter, JsonFormatter, KeyValueFormatter, LineBuffer, MARKERS_FIELD};
  use crate::value::Value;

  fn render(formatter: &dyn Formatter, event: &Event) -> (String, usize) {
    let mut out = LineBuffer::new();
    let count = formatter.format(event, &mut out);
    (String::from_utf8(out.as_slice().to_vec()).unwrap(), count)
  }

  #[test]
  fn test_key_value_basic_line() {
    // Timestamps omitted, no event sets.
    let mut event = Event::new(Level::Info, "root", "hello");
    event.insert("user", Value::from("ana"));

    let (line, errors) = render(&KeyValueFormatter, &event);
    assert_eq!(line, "level=info logger=root hello user=ana");
    assert_eq!(errors, 0);
  }

  #[test]
  fn test_key_value_with_timestamp() {
    let mut event = Event::new(Level::Warning, "db", "slow query");
    event.timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

    let (line, _) = render(&KeyValueFormatter, &event);
    assert!(line.starts_with("timestamp=2024-05-01T12:00:00.000Z "));
    assert!(line.contains("level=warning"));
  }

  #[test]
  fn test_key_value_quotes_values_with_spaces() {
    let mut event = Event::new(Level::Info, "root", "msg");
    event.insert("path", Value::from("/tmp/x"));
    event.insert("desc", Value::from("two words"));
    event.insert("empty", Value::from(""));

    let (line, _) = render(&KeyValueFormatter, &event);
    assert!(line.contains("path=/tmp/x"));
    assert!(line.contains("desc=\"two words\""));
    assert!(line.contains("empty=\"\""));
  }

  #[test]
  fn test_key_value_escapes_quotes() {
    let mut event = Event::new(Level::Info, "root", "msg");
    event.insert("q", Value::from("say \"hi\""));
    let (line, _) = render(&KeyValueFormatter, &event);
    assert!(line.contains("q=\"say \\\"hi\\\"\""));
  }

  #[test]
  fn test_key_value_markers_prefix_message() {
    let mut event = Event::new(Level::Info, "api", "request done");
    event.insert(
      MARKERS_FIELD,
      Value::List(vec![Value::from("OK"), Value::from("✓")]),
    );

    let (line, _) = render(&KeyValueFormatter, &event);
    assert!(line.contains("[OK][✓] request done"));
    // The internal field itself must not leak.
    assert!(!line.contains(MARKERS_FIELD));
  }

  #[test]
  fn test_key_value_non_finite_float_degrades() {
    let mut event = Event::new(Level::Info, "root", "msg");
    event.insert("ratio", Value::Float(f64::INFINITY));

    let (line, errors) = render(&KeyValueFormatter, &event);
    assert_eq!(errors, 1);
    assert!(line.contains("_serialization_errors=ratio"));
  }

  #[test]
  fn test_json_basic_object() {
    let mut event = Event::new(Level::Error, "api", "boom");
    event.timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    event.insert("code", Value::Int(500));

    let (line, errors) = render(&JsonFormatter, &event);
    assert_eq!(errors, 0);

    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["timestamp"], "2024-05-01T12:00:00.000Z");
    assert_eq!(parsed["level"], "error");
    assert_eq!(parsed["logger"], "api");
    assert_eq!(parsed["message"], "boom");
    assert_eq!(parsed["code"], 500);
  }

  #[test]
  fn test_json_markers_array() {
    let mut event = Event::new(Level::Info, "api", "done");
    event.insert(
      MARKERS_FIELD,
      Value::List(vec![Value::from("✅")]),
    );

    let (line, _) = render(&JsonFormatter, &event);
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["markers"], serde_json::json!(["✅"]));
    assert!(parsed.get(MARKERS_FIELD).is_none());
  }

  #[test]
  fn test_json_serialization_errors_field() {
    let mut event = Event::new(Level::Info, "root", "msg");
    event.insert("ratio", Value::Float(f64::NAN));

    let (line, errors) = render(&JsonFormatter, &event);
    assert_eq!(errors, 1);
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["_serialization_errors"], serde_json::json!(["ratio"]));
    assert!(parsed["ratio"].is_string());
  }

  #[test]
  fn test_json_nested_values() {
    let mut event = Event::new(Level::Info, "root", "msg");
    let mut inner = indexmap::IndexMap::new();
    inner.insert("a".to_string(), Value::Int(1));
    event.insert("nested", Value::Map(inner));
    event.insert("list", Value::List(vec![Value::from(true), Value::Null]));

    let (line, _) = render(&JsonFormatter, &event);
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["nested"]["a"], 1);
    assert_eq!(parsed["list"], serde_json::json!([true, null]));
  }

  #[test]
  fn test_render_is_deterministic() {
    let mut event = Event::new(Level::Info, "root", "msg");
    event.insert("b", Value::Int(2));
    event.insert("a", Value::Int(1));

    let (first, _) = render(&KeyValueFormatter, &event);
    let (second, _) = render(&KeyValueFormatter, &event.clone());
    assert_eq!(first, second);
    // Field order mirrors insertion order, not alphabetical.
    assert!(first.ends_with("msg b=2 a=1"));
  }

  #[test]
  fn test_distinct_events_render_distinct() {
    let mut left = Event::new(Level::Info, "root", "msg");
    left.insert("user", Value::from("ana"));
    let mut right = Event::new(Level::Info, "root", "msg");
    right.insert("user", Value::from("bob"));

    let (l, _) = render(&JsonFormatter, &left);
    let (r, _) = render(&JsonFormatter, &right);
    assert_ne!(l, r);
  }
}
