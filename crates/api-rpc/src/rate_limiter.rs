//! Rate Limiter (Token Bucket Algorithm, one bucket per caller)
//!
//! A caller that polls in a tight loop only exhausts its own budget.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Buckets kept before idle ones are dropped
const MAX_TRACKED_KEYS: usize = 10_000;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Keyed token bucket limiter
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
    max_keys: usize,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size per key
    /// * `refill_rate` - Tokens added per second per key
    ///
    /// # Example
    /// Allow 100 requests/sec per caller with burst of 200:
    /// `RateLimiter::new(200, 100)`
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self::with_max_keys(max_tokens, refill_rate, MAX_TRACKED_KEYS)
    }

    /// Same as [`RateLimiter::new`] with a custom cap on tracked callers
    pub fn with_max_keys(max_tokens: u32, refill_rate: u32, max_keys: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_rate,
            max_keys: max_keys.max(1),
        }
    }

    /// Consume one token from `key`'s bucket.
    ///
    /// Returns true if allowed, false if rate limited
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if buckets.len() >= self.max_keys && !buckets.contains_key(key) {
            self.evict(&mut buckets, now);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });

        self.refill(bucket, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remaining whole tokens for `key` (for monitoring)
    pub fn remaining(&self, key: &str) -> u32 {
        let buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        buckets
            .get(key)
            .map(|b| b.tokens as u32)
            .unwrap_or(self.max_tokens)
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.refill_rate as f64).min(self.max_tokens as f64);
        bucket.last_refill = now;
    }

    /// Number of callers currently tracked
    pub fn tracked_keys(&self) -> usize {
        match self.buckets.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Drop buckets that have refilled completely. If every bucket is still
    /// draining, drop the least recently used ones instead.
    fn evict(&self, buckets: &mut HashMap<String, Bucket>, now: Instant) {
        let max_tokens = self.max_tokens as f64;
        buckets.retain(|_, bucket| {
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + elapsed * (self.refill_rate as f64) < max_tokens
        });

        let target = self.max_keys - (self.max_keys / 10).max(1);
        if buckets.len() <= target {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = buckets
            .iter()
            .map(|(key, bucket)| (bucket.last_refill, key.clone()))
            .collect();
        by_age.sort();

        let excess = buckets.len() - target;
        for (_, key) in by_age.into_iter().take(excess) {
            buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let limiter = RateLimiter::new(10, 10);

        for _ in 0..10 {
            assert!(limiter.check("u1"));
        }

        // 11th should be denied
        assert!(!limiter.check("u1"));
    }

    #[test]
    fn test_callers_have_separate_budgets() {
        let limiter = RateLimiter::new(3, 1);

        for _ in 0..3 {
            assert!(limiter.check("greedy"));
        }
        assert!(!limiter.check("greedy"));

        assert!(limiter.check("polite"));
        assert_eq!(limiter.remaining("polite"), 2);
        assert_eq!(limiter.remaining("unknown"), 3);
    }

    #[test]
    fn test_idle_full_buckets_are_evicted_first() {
        let limiter = RateLimiter::with_max_keys(2, 1_000, 3);

        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(limiter.check("c"));
        std::thread::sleep(std::time::Duration::from_millis(20));

        // All three refilled to full, so they are dropped wholesale
        assert!(limiter.check("d"));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_draining_buckets_fall_back_to_oldest_first() {
        // No refill: every used bucket stays below full forever
        let limiter = RateLimiter::with_max_keys(5, 0, 4);

        for key in ["a", "b", "c", "d"] {
            assert!(limiter.check(key));
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(limiter.tracked_keys(), 4);

        assert!(limiter.check("e"));
        assert_eq!(limiter.tracked_keys(), 4);

        // "a" was the least recently used and is gone; "b" keeps its spent token
        assert_eq!(limiter.remaining("a"), 5);
        assert_eq!(limiter.remaining("b"), 4);
        assert_eq!(limiter.remaining("e"), 4);
    }

    #[tokio::test]
    async fn test_rate_limiter_refills() {
        let limiter = RateLimiter::new(5, 10); // 10 tokens/sec

        for _ in 0..5 {
            assert!(limiter.check("u1"));
        }
        assert!(!limiter.check("u1"));

        sleep(Duration::from_millis(300)).await;

        assert!(limiter.check("u1"));
    }

    #[tokio::test]
    async fn test_rate_limiter_concurrent() {
        let limiter = Arc::new(RateLimiter::new(100, 1)); // burst 100

        let mut handles = vec![];
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..20).filter(|_| limiter.check("shared")).count()
            }));
        }

        let mut total_allowed = 0;
        for handle in handles {
            total_allowed += handle.await.unwrap();
        }

        // 200 requests, burst of 100 (refill adds at most a couple)
        assert!(
            (100..=102).contains(&total_allowed),
            "Expected about 100 allowed, got {}",
            total_allowed
        );
    }
}
