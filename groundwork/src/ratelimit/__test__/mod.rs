#[cfg(test)]
mod __test__ {

  use std::sync::Arc;
  use std::time::Duration;

  use crate::ratelimit::{Clock, ManualClock, RateLimiterMap, TokenBucket};

  fn bucket(capacity: f64, rate: f64, clock: Arc<ManualClock>) -> TokenBucket {
    TokenBucket::new(capacity, rate, clock).unwrap()
  }

  #[test]
  fn test_bucket_starts_full() {
    let clock = ManualClock::new();
    let bucket = bucket(5.0, 1.0, clock);
    assert!((bucket.available_tokens() - 5.0).abs() < 1e-9);
  }

  #[test]
  fn test_acquire_drains_and_refills() {
    let clock = ManualClock::new();
    let bucket = bucket(2.0, 1.0, Arc::clone(&clock));

    assert!(bucket.try_acquire(1.0));
    assert!(bucket.try_acquire(1.0));
    assert!(!bucket.try_acquire(1.0));

    clock.advance(Duration::from_millis(1500));
    assert!(bucket.try_acquire(1.0));
    assert!(!bucket.try_acquire(1.0));
  }

  #[test]
  fn test_refill_clamps_to_capacity() {
    let clock = ManualClock::new();
    let bucket = bucket(3.0, 10.0, Arc::clone(&clock));
    clock.advance(Duration::from_secs(60));
    assert!((bucket.available_tokens() - 3.0).abs() < 1e-9);
  }

  #[test]
  fn test_cost_above_capacity_always_denies() {
    let clock = ManualClock::new();
    let bucket = bucket(2.0, 100.0, Arc::clone(&clock));
    clock.advance(Duration::from_secs(10));
    assert!(!bucket.try_acquire(3.0));
  }

  #[test]
  fn test_backward_jump_is_no_elapsed_time() {
    let clock = ManualClock::new();
    clock.set(Duration::from_secs(100));
    let bucket = bucket(2.0, 1.0, Arc::clone(&clock));
    assert!(bucket.try_acquire(2.0));

    // Clock steps backwards; the bucket must neither panic nor mint tokens.
    clock.set(Duration::from_secs(99));
    assert!(!bucket.try_acquire(1.0));

    // Once time moves past the high-water mark again, refill resumes.
    clock.set(Duration::from_secs(101));
    assert!(bucket.try_acquire(1.0));
  }

  #[test]
  fn test_admissions_bounded_by_capacity_plus_rate_window() {
    // Invariant: admissions in any window W ≤ K + r·W.
    let clock = ManualClock::new();
    let bucket = bucket(5.0, 2.0, Arc::clone(&clock));

    let mut admitted = 0u32;
    // 10-second window in 100ms steps.
    for _ in 0..100 {
      if bucket.try_acquire(1.0) {
        admitted += 1;
      }
      clock.advance(Duration::from_millis(100));
    }
    assert!(admitted as f64 <= 5.0 + 2.0 * 10.0 + 1.0, "admitted {}", admitted);
    assert!(admitted >= 20, "admitted {}", admitted);
  }

  #[test]
  fn test_invalid_parameters_rejected() {
    let clock = ManualClock::new();
    assert!(TokenBucket::new(0.0, 1.0, Arc::clone(&clock) as Arc<dyn Clock>).is_err());
    assert!(TokenBucket::new(1.0, 0.0, Arc::clone(&clock) as Arc<dyn Clock>).is_err());
    assert!(TokenBucket::new(-1.0, 1.0, clock).is_err());
  }

  #[test]
  fn test_concurrent_acquire_never_overspends() {
    let clock = ManualClock::new();
    let bucket = Arc::new(bucket(100.0, 0.001, Arc::clone(&clock)));

    let mut handles = Vec::new();
    for _ in 0..8 {
      let bucket = Arc::clone(&bucket);
      handles.push(std::thread::spawn(move || {
        let mut admitted = 0u32;
        for _ in 0..50 {
          if bucket.try_acquire(1.0) {
            admitted += 1;
          }
        }
        admitted
      }));
    }
    let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(total <= 100, "admitted {} from a 100-token bucket", total);
  }

  #[test]
  fn test_limiter_map_per_name() {
    let clock = ManualClock::new();
    let map = RateLimiterMap::new();
    assert!(map.is_empty());

    map.attach("db.pool", bucket(1.0, 1.0, Arc::clone(&clock)));
    assert!(map.get("db.pool").is_some());
    assert!(map.get("api").is_none());

    let limiter = map.get("db.pool").unwrap();
    assert!(limiter.try_acquire(1.0));
    assert!(!limiter.try_acquire(1.0));

    assert!(map.detach("db.pool"));
    assert!(!map.detach("db.pool"));
  }
}
