//! Token bucket state for one client key.

use tokio::time::Instant;

/// A refilling token bucket, created lazily at full capacity.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_second: f64, now: Instant) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_second,
            available: f64::from(capacity),
            last_refill: now,
        }
    }

    /// Refill for the time elapsed since the last call, then take one token.
    pub fn try_take(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.available = (self.available + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;

        if self.available >= 1.0 {
            self.available -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> f64 {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn drains_then_refills() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(2, 1.0, start);
        assert!(bucket.try_take(start));
        assert!(bucket.try_take(start));
        assert!(!bucket.try_take(start));
        assert!(bucket.try_take(start + Duration::from_secs(1)));
    }

    #[test]
    fn never_exceeds_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(3, 10.0, start);
        assert!(bucket.try_take(start + Duration::from_secs(60)));
        assert!((bucket.available() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_capacity_refuses() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(0, 0.0, start);
        assert!(!bucket.try_take(start + Duration::from_secs(3600)));
    }
}
