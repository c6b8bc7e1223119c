//! # Transport Seam
//!
//! The export boundary for shipping rendered log lines to a collector.
//! The wire protocol is out of scope; [`LogTransport`] is the interface an
//! OTLP-compatible exporter implements, and [`ExportSink`] adapts any
//! transport into a batching [`Sink`](crate::sink::Sink) with its own
//! worker thread.
//!
//! [`ResilientTransport`] composes the retry executor and circuit breaker
//! around an inner transport. Resilience errors surface to the transport's
//! caller (the export worker), never to logging call sites.


use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::diag;
use crate::retry::RetryPolicy;
use crate::sink::Sink;

/// Ships batches of rendered lines. Implementations block; they are only
/// ever called from a dedicated worker thread.
pub trait LogTransport: Send + Sync + 'static {
  fn name(&self) -> &str;
  fn send_batch(&self, batch: &[Vec<u8>]) -> io::Result<()>;
  fn flush(&self) -> io::Result<()> {
    Ok(())
  }
}

/// Retry + circuit breaker around an inner transport.
pub struct ResilientTransport<T: LogTransport> {
  inner: T,
  retry: RetryPolicy<io::Error>,
  breaker: CircuitBreaker,
  label: String,
}

impl<T: LogTransport> ResilientTransport<T> {
  pub fn new(inner: T, retry: RetryPolicy<io::Error>, breaker: CircuitBreaker) -> Self {
    let label = format!("resilient:{}", inner.name());
    Self {
      inner,
      retry,
      breaker,
      label,
    }
  }

  pub fn breaker(&self) -> &CircuitBreaker {
    &self.breaker
  }
}

impl<T: LogTransport> LogTransport for ResilientTransport<T> {
  fn name(&self) -> &str {
    &self.label
  }

  fn send_batch(&self, batch: &[Vec<u8>]) -> io::Result<()> {
    let outcome = self
      .breaker
      .call(|| self.retry.run(|_attempt| self.inner.send_batch(batch)));
    match outcome {
      Ok(()) => Ok(()),
      Err(BreakerError::Open { name }) => Err(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!("circuit breaker '{}' is open", name),
      )),
      Err(BreakerError::Inner(retry_err)) => Err(io::Error::new(
        io::ErrorKind::Other,
        retry_err.to_string(),
      )),
    }
  }

  fn flush(&self) -> io::Result<()> {
    self.inner.flush()
  }
}

/// In-memory transport for tests: records batches, optionally failing the
/// next N sends.
#[derive(Default)]
pub struct MemoryTransport {
  batches: Mutex<Vec<Vec<Vec<u8>>>>,
  fail_remaining: Mutex<u32>,
}

impl MemoryTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn fail_next(&self, count: u32) {
    *self.fail_remaining.lock().expect("transport lock poisoned") = count;
  }

  pub fn batches(&self) -> Vec<Vec<Vec<u8>>> {
    self.batches.lock().expect("transport lock poisoned").clone()
  }

  pub fn line_count(&self) -> usize {
    self
      .batches
      .lock()
      .expect("transport lock poisoned")
      .iter()
      .map(|b| b.len())
      .sum()
  }
}

impl LogTransport for MemoryTransport {
  fn name(&self) -> &str {
    "memory"
  }

  fn send_batch(&self, batch: &[Vec<u8>]) -> io::Result<()> {
    {
      let mut fail = self.fail_remaining.lock().expect("transport lock poisoned");
      if *fail > 0 {
        *fail -= 1;
        return Err(io::Error::new(io::ErrorKind::ConnectionReset, "injected failure"));
      }
    }
    self
      .batches
      .lock()
      .expect("transport lock poisoned")
      .push(batch.to_vec());
    Ok(())
  }
}

impl LogTransport for Arc<MemoryTransport> {
  fn name(&self) -> &str {
    "memory"
  }

  fn send_batch(&self, batch: &[Vec<u8>]) -> io::Result<()> {
    self.as_ref().send_batch(batch)
  }
}

enum ExportMessage {
  Line(Vec<u8>),
  Flush(Sender<()>),
  Shutdown,
}

/// Batching sink over a [`LogTransport`]: rendered lines queue onto a
/// bounded channel; a worker thread accumulates them and ships a batch when
/// `batch_size` is reached, on flush, and at shutdown. Queue overflow drops
/// the line and counts it; logging never blocks on the network.
pub struct ExportSink {
  label: String,
  sender: Sender<ExportMessage>,
  worker: Mutex<Option<std::thread::JoinHandle<()>>>,
  closed: AtomicBool,
}

impl ExportSink {
  pub fn new(transport: impl LogTransport, batch_size: usize, queue_capacity: usize) -> Self {
    let label = format!("export:{}", transport.name());
    let (sender, receiver) = crossbeam_channel::bounded::<ExportMessage>(queue_capacity.max(1));
    let batch_size = batch_size.max(1);
    let worker = std::thread::Builder::new()
      .name("groundwork-export".to_string())
      .spawn(move || Self::export_loop(receiver, transport, batch_size))
      .expect("failed to spawn export worker");
    Self {
      label,
      sender,
      worker: Mutex::new(Some(worker)),
      closed: AtomicBool::new(false),
    }
  }

  fn export_loop(receiver: Receiver<ExportMessage>, transport: impl LogTransport, batch_size: usize) {
    let mut pending: Vec<Vec<u8>> = Vec::with_capacity(batch_size);

    let ship = |pending: &mut Vec<Vec<u8>>| {
      if pending.is_empty() {
        return;
      }
      if let Err(e) = transport.send_batch(pending) {
        diag::global().record_sink_error();
        eprintln!("[Export] batch of {} lost: {}", pending.len(), e);
      }
      pending.clear();
    };

    while let Ok(message) = receiver.recv() {
      match message {
        ExportMessage::Line(line) => {
          pending.push(line);
          if pending.len() >= batch_size {
            ship(&mut pending);
          }
        },
        ExportMessage::Flush(ack) => {
          ship(&mut pending);
          let _ = transport.flush();
          let _ = ack.send(());
        },
        ExportMessage::Shutdown => break,
      }
    }
    ship(&mut pending);
    let _ = transport.flush();
  }
}

impl crate::sink::Sink for ExportSink {
  fn name(&self) -> &str {
    &self.label
  }

  fn write(&self, line: &[u8]) {
    if self.closed.load(Ordering::Relaxed) {
      return;
    }
    match self.sender.try_send(ExportMessage::Line(line.to_vec())) {
      Ok(()) => {},
      Err(TrySendError::Full(_)) => diag::global().record_async_queue_drop(),
      Err(TrySendError::Disconnected(_)) => {
        diag::global().record_sink_error();
        eprintln!("[Export] worker disconnected ({})", self.label);
      },
    }
  }

  fn flush(&self) {
    if self.closed.load(Ordering::Relaxed) {
      return;
    }
    let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
    if self.sender.send(ExportMessage::Flush(ack_tx)).is_ok() {
      let _ = ack_rx.recv_timeout(std::time::Duration::from_secs(5));
    }
  }

  fn close(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    let _ = self.sender.send(ExportMessage::Shutdown);
    if let Some(worker) = self.worker.lock().expect("export sink lock poisoned").take() {
      let _ = worker.join();
    }
  }
}

impl Drop for ExportSink {
  fn drop(&mut self) {
    self.close();
  }
}
