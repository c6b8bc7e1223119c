
use std::sync::atomic::{AtomicBool, Ordering};

/// `PanicHook` wires process panics into the logging pipeline.
///
/// When a panic occurs, the hook logs a critical event with the panic
/// payload and location through the hub's pipeline, then flushes every sink
/// so the final event is not lost with the process. The previously
/// installed hook (including the default backtrace printer) still runs
/// afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use groundwork::panic_hook::PanicHook;
///
/// PanicHook::install();
/// // Any later panic is logged and sinks are flushed before unwinding
/// // continues.
/// ```
pub struct PanicHook {}

static INSTALLED: AtomicBool = AtomicBool::new(false);

impl PanicHook {
  /// Installs the hook. Idempotent; later calls are no-ops.
  ///
  /// The hook stays lightweight: one log dispatch and a flush. It must not
  /// allocate the hub lazily during unwinding, so an uninitialized hub
  /// means the hook only reports to stderr.
  pub fn install() {
    if INSTALLED.swap(true, Ordering::SeqCst) {
      return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
      let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
      } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
      } else {
        "panic with non-string payload".to_string()
      };
      let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown".to_string());

      if crate::hub::global().is_initialized() {
        let logger = crate::hub::global().get_logger("panic");
        logger.critical_with(
          "panic captured",
          vec![
            ("panic_message".to_string(), crate::value::Value::from(message.as_str())),
            ("panic_location".to_string(), crate::value::Value::from(location.as_str())),
          ],
        );
        crate::hub::global().flush();
        eprintln!("[Panic] event flushed to sinks");
      } else {
        eprintln!("[Panic] captured before hub init: {} at {}", message, location);
      }

      previous(info);
    }));
  }
}
