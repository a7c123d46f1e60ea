//! Exponential backoff policy shared by the listen-key creation retry loop
//! and the webhook-dispatch retry loop (Section 5: "Retries use
//! exponential backoff with caps (attempt delays 500 ms -> 5 s, factor 2,
//! up to N=maxRetry=3 for webhook; 5 attempts for listen-key creation)").
//!
//! Pure and dependency-free so it can be unit tested without an async
//! runtime; callers drive the actual sleep.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub multiplier: u64,
    pub max_ms: u64,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub const fn webhook() -> Self {
        Self {
            initial_ms: 500,
            multiplier: 2,
            max_ms: 5_000,
            max_attempts: 3,
        }
    }

    pub const fn listen_key() -> Self {
        Self {
            initial_ms: 500,
            multiplier: 2,
            max_ms: 5_000,
            max_attempts: 5,
        }
    }

    /// Delay before the given zero-indexed attempt, capped at `max_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let scaled = self
            .initial_ms
            .saturating_mul(self.multiplier.saturating_pow(attempt));
        scaled.min(self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let policy = BackoffPolicy::webhook();
        assert_eq!(policy.delay_ms(0), 500);
        assert_eq!(policy.delay_ms(1), 1_000);
        assert_eq!(policy.delay_ms(2), 2_000);
        assert_eq!(policy.delay_ms(3), 4_000);
        assert_eq!(policy.delay_ms(10), 5_000);
    }
}
