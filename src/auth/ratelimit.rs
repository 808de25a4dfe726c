//! Per-identity token-bucket rate limiting, keyed by
//! `(identity, endpoint class)`. Never blocks — a denied request gets a
//! retry-after hint instead of sleeping, since these run inline in a
//! request handler.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Coarse endpoint classes with distinct limits.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EndpointClass {
    /// Every authenticated endpoint not otherwise classified: ~100/min,
    /// burst 20.
    Authenticated,
    /// Password-reset OTP requests: ~3/hour per email.
    PasswordResetOtp,
}

impl EndpointClass {
    fn limits(self) -> (u32, f64) {
        match self {
            Self::Authenticated => (20, 100.0 / 60.0),
            Self::PasswordResetOtp => (3, 3.0 / 3600.0),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> Option<Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

/// A token bucket per `(identity, endpoint class)`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, EndpointClass), TokenBucket>>,
}

impl RateLimiter {
    /// Build an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to consume one token for `identity` in `class`. Returns `Ok(())`
    /// if permitted, or `Err(retry_after)` — seconds until a token is next
    /// available — if the bucket is empty.
    ///
    /// # Errors
    ///
    /// Returns the number of seconds to wait before retrying.
    pub fn check(&self, identity: &str, class: EndpointClass) -> Result<(), u64> {
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");
        let bucket = buckets
            .entry((identity.to_owned(), class))
            .or_insert_with(|| {
                let (capacity, refill_per_sec) = class.limits();
                TokenBucket::new(capacity, refill_per_sec)
            });

        match bucket.try_consume() {
            None => Ok(()),
            Some(wait) => Err(wait.as_secs().max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_bucket_allows_its_burst_size() {
        let limiter = RateLimiter::new();
        for _ in 0..20 {
            assert!(limiter.check("user-1", EndpointClass::Authenticated).is_ok());
        }
        assert!(limiter.check("user-1", EndpointClass::Authenticated).is_err());
    }

    #[test]
    fn buckets_are_independent_per_identity() {
        let limiter = RateLimiter::new();
        for _ in 0..20 {
            limiter.check("user-1", EndpointClass::Authenticated).ok();
        }
        assert!(limiter.check("user-2", EndpointClass::Authenticated).is_ok());
    }

    #[test]
    fn buckets_are_independent_per_endpoint_class() {
        let limiter = RateLimiter::new();
        for _ in 0..20 {
            limiter.check("user-1", EndpointClass::Authenticated).ok();
        }
        assert!(limiter.check("user-1", EndpointClass::PasswordResetOtp).is_ok());
    }
}
