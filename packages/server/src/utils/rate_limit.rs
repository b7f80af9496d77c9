use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Best-effort fixed-window request limiter.
///
/// State is process-local and resets on restart; two instances behind a load
/// balancer each enforce the limit independently. That is acceptable here:
/// the limiter only damps abuse of the public submission flow, it is not a
/// correctness mechanism.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

struct Window {
    started_at: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    /// `limit` requests per key per minute. 0 disables limiting.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Record a hit for `key`. Returns `Err(retry_after_secs)` when the key
    /// is over its window budget.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        if self.limit == 0 {
            return Ok(()); // Rate limiting disabled
        }

        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.started_at);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = FixedWindowLimiter::per_minute(3);
        for _ in 0..3 {
            assert_eq!(limiter.check("a@b.c"), Ok(()));
        }
        let retry = limiter.check("a@b.c").unwrap_err();
        assert!(retry >= 1 && retry <= 60);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::per_minute(1);
        assert_eq!(limiter.check("one@x.y"), Ok(()));
        assert_eq!(limiter.check("two@x.y"), Ok(()));
        assert!(limiter.check("one@x.y").is_err());
    }

    #[test]
    fn zero_limit_disables() {
        let limiter = FixedWindowLimiter::per_minute(0);
        for _ in 0..100 {
            assert_eq!(limiter.check("k"), Ok(()));
        }
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(10));
        assert_eq!(limiter.check("k"), Ok(()));
        assert!(limiter.check("k").is_err());

        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(limiter.check("k"), Ok(()));
    }
}
