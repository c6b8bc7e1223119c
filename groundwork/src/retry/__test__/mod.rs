#[cfg(test)]
mod __test__ {

  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  use crate::retry::{Backoff, RetryError, RetryPolicy};

  #[derive(Debug)]
  struct TestError {
    retryable: bool,
  }

  impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "test error (retryable={})", self.retryable)
    }
  }

  fn fast_policy(max_attempts: u32) -> RetryPolicy<TestError> {
    RetryPolicy::builder()
      .max_attempts(max_attempts)
      .base_delay(Duration::from_millis(1))
      .max_delay(Duration::from_millis(2))
      .backoff(Backoff::Fixed)
      .retryable_if(|e: &TestError| e.retryable)
      .build()
      .unwrap()
  }

  #[test]
  fn test_success_returns_immediately() {
    let calls = AtomicU32::new(0);
    let result = fast_policy(5).run(|_| {
      calls.fetch_add(1, Ordering::Relaxed);
      Ok::<_, TestError>(42)
    });
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn test_permanently_failing_op_invoked_exactly_max_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast_policy(4).run(|_| {
      calls.fetch_add(1, Ordering::Relaxed);
      Err(TestError { retryable: true })
    });

    assert_eq!(calls.load(Ordering::Relaxed), 4);
    match result.unwrap_err() {
      RetryError::Exhausted { attempts, .. } => assert_eq!(attempts, 4),
      other => panic!("expected Exhausted, got {:?}", other),
    }
  }

  #[test]
  fn test_single_attempt_no_suspension() {
    let calls = AtomicU32::new(0);
    let started = std::time::Instant::now();
    let result: Result<(), _> = fast_policy(1).run(|_| {
      calls.fetch_add(1, Ordering::Relaxed);
      Err(TestError { retryable: true })
    });

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert!(result.is_err());
    // No backoff sleep occurred.
    assert!(started.elapsed() < Duration::from_millis(50));
  }

  #[test]
  fn test_non_retryable_propagates_unchanged() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast_policy(5).run(|_| {
      calls.fetch_add(1, Ordering::Relaxed);
      Err(TestError { retryable: false })
    });

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    match result.unwrap_err() {
      RetryError::Permanent(e) => assert!(!e.retryable),
      other => panic!("expected Permanent, got {:?}", other),
    }
  }

  #[test]
  fn test_eventual_success_after_failures() {
    let calls = AtomicU32::new(0);
    let result = fast_policy(4).run(|attempt| {
      calls.fetch_add(1, Ordering::Relaxed);
      if attempt < 3 {
        Err(TestError { retryable: true })
      } else {
        Ok("done")
      }
    });
    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::Relaxed), 3);
  }

  #[test]
  fn test_delay_formulas() {
    let fixed: RetryPolicy<TestError> = RetryPolicy::builder()
      .base_delay(Duration::from_millis(10))
      .max_delay(Duration::from_secs(10))
      .backoff(Backoff::Fixed)
      .build()
      .unwrap();
    assert_eq!(fixed.delay_for(1), Duration::from_millis(10));
    assert_eq!(fixed.delay_for(5), Duration::from_millis(10));

    let linear: RetryPolicy<TestError> = RetryPolicy::builder()
      .base_delay(Duration::from_millis(10))
      .max_delay(Duration::from_secs(10))
      .backoff(Backoff::Linear)
      .build()
      .unwrap();
    assert_eq!(linear.delay_for(1), Duration::from_millis(10));
    assert_eq!(linear.delay_for(3), Duration::from_millis(30));

    let exponential: RetryPolicy<TestError> = RetryPolicy::builder()
      .base_delay(Duration::from_millis(10))
      .max_delay(Duration::from_millis(80))
      .backoff(Backoff::Exponential)
      .build()
      .unwrap();
    assert_eq!(exponential.delay_for(1), Duration::from_millis(10));
    assert_eq!(exponential.delay_for(2), Duration::from_millis(20));
    assert_eq!(exponential.delay_for(3), Duration::from_millis(40));
    // Clamped to max_delay.
    assert_eq!(exponential.delay_for(4), Duration::from_millis(80));
    assert_eq!(exponential.delay_for(10), Duration::from_millis(80));
  }

  #[test]
  fn test_exponential_backoff_with_jitter_bounds() {
    // {max_attempts=4, base=10ms, max=80ms, exponential, jitter=0.2}
    // against an operation failing 3 times then succeeding.
    let recorded: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);

    let policy: RetryPolicy<TestError> = RetryPolicy::builder()
      .max_attempts(4)
      .base_delay(Duration::from_millis(10))
      .max_delay(Duration::from_millis(80))
      .backoff(Backoff::Exponential)
      .jitter(0.2)
      .on_retry(move |_, delay| sink.lock().unwrap().push(delay))
      .build()
      .unwrap();

    let calls = AtomicU32::new(0);
    let result = policy.run(|attempt| {
      calls.fetch_add(1, Ordering::Relaxed);
      if attempt <= 3 {
        Err(TestError { retryable: true })
      } else {
        Ok(())
      }
    });

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::Relaxed), 4);

    let delays = recorded.lock().unwrap().clone();
    assert_eq!(delays.len(), 3);
    let base = 10.0;
    for (i, delay) in delays.iter().enumerate() {
      let nominal = (base * 2f64.powi(i as i32)).min(80.0);
      let low = 0.9 * base;
      let high = nominal * 1.1;
      let ms = delay.as_secs_f64() * 1000.0;
      assert!(ms >= low - 1e-6, "delay {} = {}ms below {}", i, ms, low);
      assert!(ms <= high + 1e-6, "delay {} = {}ms above {}", i, ms, high);
    }
  }

  #[test]
  fn test_builder_validation() {
    assert!(RetryPolicy::<TestError>::builder().max_attempts(0).build().is_err());
    assert!(RetryPolicy::<TestError>::builder().jitter(1.5).build().is_err());
    assert!(RetryPolicy::<TestError>::builder().jitter(-0.1).build().is_err());
    assert!(RetryPolicy::<TestError>::builder()
      .base_delay(Duration::from_millis(100))
      .max_delay(Duration::from_millis(10))
      .build()
      .is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_async_retry_eventual_success() {
    let policy: RetryPolicy<TestError> = RetryPolicy::builder()
      .max_attempts(3)
      .base_delay(Duration::from_millis(50))
      .max_delay(Duration::from_millis(200))
      .backoff(Backoff::Exponential)
      .retryable_if(|e: &TestError| e.retryable)
      .build()
      .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let result = policy
      .run_async(move |attempt| {
        let counter = Arc::clone(&counter);
        async move {
          counter.fetch_add(1, Ordering::Relaxed);
          if attempt < 3 {
            Err(TestError { retryable: true })
          } else {
            Ok("async done")
          }
        }
      })
      .await;

    assert_eq!(result.unwrap(), "async done");
    assert_eq!(calls.load(Ordering::Relaxed), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_async_cancellation_stops_attempts() {
    let policy: RetryPolicy<TestError> = RetryPolicy::builder()
      .max_attempts(10)
      .base_delay(Duration::from_secs(3600))
      .max_delay(Duration::from_secs(3600))
      .backoff(Backoff::Fixed)
      .build()
      .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let future = policy.run_async(move |_| {
      let counter = Arc::clone(&counter);
      async move {
        counter.fetch_add(1, Ordering::Relaxed);
        Err::<(), _>(TestError { retryable: true })
      }
    });

    // Cancel while the executor is suspended between attempts.
    let outcome = tokio::time::timeout(Duration::from_millis(10), future).await;
    assert!(outcome.is_err(), "retry should still have been sleeping");
    assert_eq!(calls.load(Ordering::Relaxed), 1);
  }
}
