#[cfg(test)]
mod __test__ {

  use std::sync::Arc;

  use crate::sink::{AsyncSink, FileSink, MemorySink, NullSink, RotatingFileSink, Sink};

  #[test]
  fn test_memory_sink_captures_lines() {
    let sink = MemorySink::new();
    sink.write(b"first\n");
    sink.write(b"second\n");

    assert_eq!(sink.lines(), vec!["first", "second"]);
    sink.clear();
    assert!(sink.is_empty());
  }

  #[test]
  fn test_null_sink_discards() {
    let sink = NullSink;
    sink.write(b"anything\n");
    sink.flush();
    sink.close();
    sink.close();
  }

  #[test]
  fn test_file_sink_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("app.log");

    let sink = FileSink::new(&path).unwrap();
    sink.write(b"one\n");
    sink.write(b"two\n");
    sink.flush();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "one\ntwo\n");
  }

  #[test]
  fn test_file_sink_close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let sink = FileSink::new(&path).unwrap();
    sink.write(b"line\n");
    sink.close();
    sink.close();
    // Writes after close are silent no-ops.
    sink.write(b"late\n");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "line\n");
  }

  #[test]
  fn test_rotation_shifts_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    // Each 10-byte line overflows the 15-byte cap on the second write.
    let sink = RotatingFileSink::new(&path, 15, 2).unwrap();

    sink.write(b"aaaaaaaaa\n");
    sink.write(b"bbbbbbbbb\n"); // rotates: a → .1
    sink.write(b"ccccccccc\n"); // rotates: b → .1, a → .2
    sink.flush();

    let active = std::fs::read_to_string(&path).unwrap();
    let one = std::fs::read_to_string(dir.path().join("app.log.1")).unwrap();
    let two = std::fs::read_to_string(dir.path().join("app.log.2")).unwrap();
    assert_eq!(active, "ccccccccc\n");
    assert_eq!(one, "bbbbbbbbb\n");
    assert_eq!(two, "aaaaaaaaa\n");
  }

  #[test]
  fn test_rotation_drops_oldest_beyond_keep_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let sink = RotatingFileSink::new(&path, 5, 2).unwrap();

    for i in 0..5 {
      sink.write(format!("line{}\n", i).as_bytes());
    }
    sink.close();

    // Only the active file plus .1 and .2 may exist; .0 is never used.
    assert!(path.exists());
    assert!(dir.path().join("app.log.1").exists());
    assert!(dir.path().join("app.log.2").exists());
    assert!(!dir.path().join("app.log.0").exists());
    assert!(!dir.path().join("app.log.3").exists());
  }

  #[test]
  fn test_rotation_preserves_previous_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let sink = RotatingFileSink::new(&path, 8, 3).unwrap();

    sink.write(b"first!!\n");
    sink.write(b"second!\n");
    sink.close();

    let rotated = std::fs::read_to_string(dir.path().join("app.log.1")).unwrap();
    assert_eq!(rotated, "first!!\n");
  }

  #[test]
  fn test_async_sink_forwards_and_drains_on_close() {
    let memory = MemorySink::new();
    let sink = AsyncSink::new(Arc::clone(&memory) as Arc<dyn Sink>, 64);

    for i in 0..10 {
      sink.write(format!("line-{}\n", i).as_bytes());
    }
    sink.close();

    let lines = memory.lines();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "line-0");
    assert_eq!(lines[9], "line-9");
  }

  #[test]
  fn test_async_sink_flush_waits_for_queue() {
    let memory = MemorySink::new();
    let sink = AsyncSink::new(Arc::clone(&memory) as Arc<dyn Sink>, 64);

    sink.write(b"queued\n");
    sink.flush();
    assert_eq!(memory.lines(), vec!["queued"]);
    sink.close();
  }

  #[test]
  fn test_async_sink_close_idempotent_and_write_after_close() {
    let memory = MemorySink::new();
    let sink = AsyncSink::new(Arc::clone(&memory) as Arc<dyn Sink>, 8);
    sink.write(b"kept\n");
    sink.close();
    sink.close();
    sink.write(b"dropped\n");

    assert_eq!(memory.lines(), vec!["kept"]);
  }
}
