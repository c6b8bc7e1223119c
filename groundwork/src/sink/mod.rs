//! # Sink Adapters
//!
//! Terminal writers consuming rendered lines. Writes are best-effort and
//! never throw into the caller: failures are counted in
//! [`crate::diag::Diagnostics`] and reported on stderr. `close` is
//! idempotent everywhere.

mod __test__;

use std::fs::{File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::diag;

/// Terminal writer. `write` receives one rendered line, newline included.
pub trait Sink: Send + Sync + 'static {
  fn name(&self) -> &str;
  /// Best-effort write; never propagates errors to the caller.
  fn write(&self, line: &[u8]);
  /// Force buffered data down to the underlying medium.
  fn flush(&self);
  /// Flush and release handles. Idempotent.
  fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
  Stdout,
  Stderr,
}

/// stderr/stdout writer. Writes serialize on a per-sink lock.
pub struct StreamSink {
  target: StreamTarget,
  lock: Mutex<()>,
  closed: AtomicBool,
}

impl StreamSink {
  pub fn stderr() -> Self {
    Self {
      target: StreamTarget::Stderr,
      lock: Mutex::new(()),
      closed: AtomicBool::new(false),
    }
  }

  pub fn stdout() -> Self {
    Self {
      target: StreamTarget::Stdout,
      lock: Mutex::new(()),
      closed: AtomicBool::new(false),
    }
  }
}

impl Sink for StreamSink {
  fn name(&self) -> &str {
    match self.target {
      StreamTarget::Stdout => "stdout_stream",
      StreamTarget::Stderr => "stderr_stream",
    }
  }

  fn write(&self, line: &[u8]) {
    if self.closed.load(Ordering::Relaxed) {
      return;
    }
    let _guard = self.lock.lock().expect("stream sink lock poisoned");
    let result = match self.target {
      StreamTarget::Stdout => std::io::stdout().write_all(line),
      StreamTarget::Stderr => std::io::stderr().write_all(line),
    };
    if result.is_err() {
      diag::global().record_sink_error();
    }
  }

  fn flush(&self) {
    let _guard = self.lock.lock().expect("stream sink lock poisoned");
    let _ = match self.target {
      StreamTarget::Stdout => std::io::stdout().flush(),
      StreamTarget::Stderr => std::io::stderr().flush(),
    };
  }

  fn close(&self) {
    // Process streams are not ours to release; closing just stops writes.
    self.flush();
    self.closed.store(true, Ordering::Relaxed);
  }
}

/// Append-only file writer. Parent directories are created on open.
pub struct FileSink {
  path: PathBuf,
  file: Mutex<Option<File>>,
}

impl FileSink {
  pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok(Self {
      path,
      file: Mutex::new(Some(file)),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Sink for FileSink {
  fn name(&self) -> &str {
    "file_append"
  }

  fn write(&self, line: &[u8]) {
    let mut guard = self.file.lock().expect("file sink lock poisoned");
    if let Some(file) = guard.as_mut() {
      if let Err(e) = file.write_all(line) {
        diag::global().record_sink_error();
        eprintln!("[Sink] file write failed ({}): {}", self.path.display(), e);
      }
    }
  }

  fn flush(&self) {
    let mut guard = self.file.lock().expect("file sink lock poisoned");
    if let Some(file) = guard.as_mut() {
      let _ = file.sync_data();
    }
  }

  fn close(&self) {
    let mut guard = self.file.lock().expect("file sink lock poisoned");
    if let Some(mut file) = guard.take() {
      let _ = file.flush();
      let _ = file.sync_data();
    }
  }
}

struct RotateState {
  file: Option<File>,
  size: u64,
}

/// Size-based rotating file writer.
///
/// When the active file would exceed `max_size`, it is renamed to `.1`,
/// existing suffixes shift `.1→.2 … .(n-1)→.n`, `.n` is dropped, and a fresh
/// active file is opened. Suffix `.0` is never used. Rotation and writes
/// serialize on the sink lock; cross-process safety is out of scope.
pub struct RotatingFileSink {
  path: PathBuf,
  max_size: u64,
  keep_count: u32,
  state: Mutex<RotateState>,
}

impl RotatingFileSink {
  pub fn new(path: impl AsRef<Path>, max_size: u64, keep_count: u32) -> std::io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok(Self {
      path,
      max_size: max_size.max(1),
      keep_count: keep_count.max(1),
      state: Mutex::new(RotateState {
        file: Some(file),
        size,
      }),
    })
  }

  fn suffixed(&self, index: u32) -> PathBuf {
    let mut os = self.path.clone().into_os_string();
    os.push(format!(".{}", index));
    PathBuf::from(os)
  }

  fn rotate(&self, state: &mut RotateState) {
    state.file = None;

    // Shift oldest-first so each rename lands on a free slot.
    let _ = std::fs::remove_file(self.suffixed(self.keep_count));
    for index in (1..self.keep_count).rev() {
      let _ = std::fs::rename(self.suffixed(index), self.suffixed(index + 1));
    }
    if let Err(e) = std::fs::rename(&self.path, self.suffixed(1)) {
      diag::global().record_sink_error();
      eprintln!("[Sink] rotate failed ({}): {}", self.path.display(), e);
    }

    match OpenOptions::new().create(true).append(true).open(&self.path) {
      Ok(file) => {
        state.file = Some(file);
        state.size = 0;
      },
      Err(e) => {
        diag::global().record_sink_error();
        eprintln!("[Sink] reopen failed ({}): {}", self.path.display(), e);
      },
    }
  }
}

impl Sink for RotatingFileSink {
  fn name(&self) -> &str {
    "rotating_file"
  }

  fn write(&self, line: &[u8]) {
    let mut state = self.state.lock().expect("rotating sink lock poisoned");
    if state.file.is_none() {
      return;
    }
    if state.size > 0 && state.size + line.len() as u64 > self.max_size {
      self.rotate(&mut state);
    }
    if let Some(file) = state.file.as_mut() {
      match file.write_all(line) {
        Ok(()) => state.size += line.len() as u64,
        Err(e) => {
          diag::global().record_sink_error();
          eprintln!("[Sink] rotating write failed ({}): {}", self.path.display(), e);
        },
      }
    }
  }

  fn flush(&self) {
    let mut state = self.state.lock().expect("rotating sink lock poisoned");
    if let Some(file) = state.file.as_mut() {
      let _ = file.sync_data();
    }
  }

  fn close(&self) {
    let mut state = self.state.lock().expect("rotating sink lock poisoned");
    if let Some(mut file) = state.file.take() {
      let _ = file.flush();
      let _ = file.sync_data();
    }
  }
}

/// Discards everything. Installed when telemetry is disabled.
pub struct NullSink;

impl Sink for NullSink {
  fn name(&self) -> &str {
    "null_sink"
  }

  fn write(&self, _line: &[u8]) {}

  fn flush(&self) {}

  fn close(&self) {}
}

/// Captures rendered lines in memory for tests.
#[derive(Default)]
pub struct MemorySink {
  lines: Mutex<Vec<String>>,
}

impl MemorySink {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().expect("memory sink lock poisoned").clone()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.lock().expect("memory sink lock poisoned").is_empty()
  }

  pub fn clear(&self) {
    self.lines.lock().expect("memory sink lock poisoned").clear();
  }
}

impl Sink for MemorySink {
  fn name(&self) -> &str {
    "memory_sink"
  }

  fn write(&self, line: &[u8]) {
    let text = String::from_utf8_lossy(line).trim_end_matches('\n').to_string();
    self.lines.lock().expect("memory sink lock poisoned").push(text);
  }

  fn flush(&self) {}

  fn close(&self) {}
}

enum SinkMessage {
  Line(Vec<u8>),
  Flush(Sender<()>),
  Shutdown,
}

/// Decouples callers from slow sinks with a bounded queue and a dedicated
/// writer thread. When the queue is full the line is dropped and counted;
/// logging never blocks the application.
pub struct AsyncSink {
  label: String,
  sender: Sender<SinkMessage>,
  worker: Mutex<Option<std::thread::JoinHandle<()>>>,
  closed: AtomicBool,
}

impl AsyncSink {
  pub fn new(inner: Arc<dyn Sink>, queue_capacity: usize) -> Self {
    let (sender, receiver) = crossbeam_channel::bounded::<SinkMessage>(queue_capacity.max(1));
    let label = format!("async:{}", inner.name());
    let worker = std::thread::Builder::new()
      .name("groundwork-sink".to_string())
      .spawn(move || Self::writer_loop(receiver, inner))
      .expect("failed to spawn sink worker");
    Self {
      label,
      sender,
      worker: Mutex::new(Some(worker)),
      closed: AtomicBool::new(false),
    }
  }

  fn writer_loop(receiver: Receiver<SinkMessage>, inner: Arc<dyn Sink>) {
    while let Ok(message) = receiver.recv() {
      match message {
        SinkMessage::Line(line) => inner.write(&line),
        SinkMessage::Flush(ack) => {
          inner.flush();
          let _ = ack.send(());
        },
        SinkMessage::Shutdown => break,
      }
    }
    inner.flush();
    inner.close();
  }
}

impl Sink for AsyncSink {
  fn name(&self) -> &str {
    &self.label
  }

  fn write(&self, line: &[u8]) {
    if self.closed.load(Ordering::Relaxed) {
      return;
    }
    match self.sender.try_send(SinkMessage::Line(line.to_vec())) {
      Ok(()) => {},
      Err(TrySendError::Full(_)) => {
        // Backpressure: drop rather than block the caller.
        diag::global().record_async_queue_drop();
      },
      Err(TrySendError::Disconnected(_)) => {
        diag::global().record_sink_error();
        eprintln!("[Sink] worker disconnected ({})", self.label);
      },
    }
  }

  fn flush(&self) {
    if self.closed.load(Ordering::Relaxed) {
      return;
    }
    let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
    if self.sender.send(SinkMessage::Flush(ack_tx)).is_ok() {
      // Bounded wait so a dead worker cannot hang shutdown.
      let _ = ack_rx.recv_timeout(std::time::Duration::from_secs(5));
    }
  }

  fn close(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    let _ = self.sender.send(SinkMessage::Shutdown);
    if let Some(worker) = self.worker.lock().expect("async sink lock poisoned").take() {
      let _ = worker.join();
    }
  }
}

impl Drop for AsyncSink {
  fn drop(&mut self) {
    self.close();
  }
}
