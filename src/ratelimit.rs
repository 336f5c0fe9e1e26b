//! Shared blocking rate limiter for deletion I/O.
//!
//! A single limiter is shared by the eviction scheduler and manual clears so
//! the combined deletion throughput stays under one cap. Token bucket with a
//! one-second window; acquire() blocks the calling thread when the bucket is
//! empty. Deletion throttles under contention, it never fails.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: u32,
    window_start: Instant,
}

/// Thread-safe token-bucket limiter (permits per second).
/// A rate of 0 disables throttling entirely.
pub struct RateLimiter {
    rate: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                window_start: Instant::now(),
            }),
        }
    }

    /// Take one permit, sleeping until the next window if the current one is
    /// exhausted.
    pub fn acquire(&self) {
        if self.rate == 0 {
            return;
        }
        loop {
            let sleep_for = {
                let mut b = self.bucket.lock().unwrap();
                let elapsed = b.window_start.elapsed();
                if elapsed >= Duration::from_secs(1) {
                    b.tokens = self.rate;
                    b.window_start = Instant::now();
                }
                if b.tokens > 0 {
                    b.tokens -= 1;
                    return;
                }
                Duration::from_secs(1).saturating_sub(elapsed)
            };
            // Sleep outside the lock
            std::thread::sleep(sleep_for.max(Duration::from_millis(1)));
        }
    }
}
