//! Retry decisions with exponential back-off and additive jitter
//!
//! | Outcome | Action |
//! |---------|--------|
//! | status < 400 | succeed |
//! | 429 | retry after `min(max_delay, unit * 2^attempt + jitter(rate_limit))` |
//! | 500, 502, 503, 504 | retry after `jitter(server_error)` |
//! | other status >= 400 | give up immediately |
//! | timeout or network error | retry after `unit * 2^attempt + jitter(network)` while `attempt < max_network_attempts` |
//!
//! Every path shares the `max_attempts` cap on total fetches. Jitter is only
//! ever added, never subtracted.

use crate::config::RetryConfig;
use crate::crawler::request::{FetchOutcome, TransientKind};
use rand::Rng;
use std::time::Duration;

/// What to do after a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Succeed,
    Retry(Duration),
    GiveUp,
}

/// Per-request retry state machine
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decides the follow-up to `outcome` observed on attempt number `attempt` (0-based)
    ///
    /// # Arguments
    ///
    /// * `outcome` - Result of the attempt
    /// * `attempt` - Index of the attempt that produced `outcome`
    /// * `rng` - Jitter source
    pub fn decide<R: Rng + ?Sized>(
        &self,
        outcome: &FetchOutcome,
        attempt: u32,
        rng: &mut R,
    ) -> RetryDecision {
        let kind = match outcome {
            FetchOutcome::Success(_) => return RetryDecision::Succeed,
            FetchOutcome::PermanentFailure { .. } => return RetryDecision::GiveUp,
            FetchOutcome::TransientFailure(kind) => kind,
        };

        if attempt.saturating_add(1) >= self.config.max_attempts {
            return RetryDecision::GiveUp;
        }

        match kind {
            TransientKind::Status(429) => RetryDecision::Retry(
                self.rate_limit_delay(attempt, self.config.rate_limit_jitter_ms.sample(rng)),
            ),
            TransientKind::Status(_) => RetryDecision::Retry(
                self.cap(self.config.server_error_jitter_ms.sample(rng)),
            ),
            TransientKind::Timeout | TransientKind::Network(_) => {
                if attempt >= self.config.max_network_attempts {
                    RetryDecision::GiveUp
                } else {
                    RetryDecision::Retry(
                        self.network_delay(attempt, self.config.network_jitter_ms.sample(rng)),
                    )
                }
            }
        }
    }

    /// Back-off after a 429: exponential term plus jitter, capped at `max_delay_ms`
    ///
    /// For a fixed jitter this is non-decreasing in `attempt`.
    pub fn rate_limit_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        self.cap(self.exponential(attempt).saturating_add(jitter))
    }

    /// Back-off after a timeout or network error
    pub fn network_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        self.cap(self.exponential(attempt).saturating_add(jitter))
    }

    /// `backoff_unit * 2^attempt`, saturating
    fn exponential(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
        Duration::from_millis(self.config.backoff_unit_ms.saturating_mul(factor))
    }

    fn cap(&self, delay: Duration) -> Duration {
        delay.min(Duration::from_millis(self.config.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::crawler::request::FetchedPage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use url::Url;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig::default())
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn status(code: u16) -> FetchOutcome {
        FetchOutcome::from_response(
            code,
            Url::parse("https://hikoco.co.nz/").unwrap(),
            String::new(),
        )
    }

    #[test]
    fn test_success_succeeds() {
        let outcome = FetchOutcome::Success(FetchedPage {
            status: 200,
            final_url: Url::parse("https://hikoco.co.nz/").unwrap(),
            body: String::new(),
        });
        assert_eq!(policy().decide(&outcome, 0, &mut rng()), RetryDecision::Succeed);
    }

    #[test]
    fn test_not_found_gives_up_immediately() {
        assert_eq!(policy().decide(&status(404), 0, &mut rng()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_rate_limit_delay_bounds() {
        let mut rng = rng();
        for attempt in 0..4 {
            match policy().decide(&status(429), attempt, &mut rng) {
                RetryDecision::Retry(delay) => {
                    let floor = Duration::from_millis(1_000 * (1 << attempt) + 5_000);
                    assert!(delay >= floor, "attempt {attempt}: {delay:?}");
                    assert!(delay <= Duration::from_secs(60));
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rate_limit_delay_monotonic_and_capped() {
        let policy = policy();
        let jitter = Duration::from_secs(10);
        let mut previous = Duration::ZERO;
        for attempt in 0..20 {
            let delay = policy.rate_limit_delay(attempt, jitter);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(60));
            previous = delay;
        }
        assert_eq!(previous, Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_cap_at_five_attempts() {
        let mut rng = rng();
        assert!(matches!(
            policy().decide(&status(429), 3, &mut rng),
            RetryDecision::Retry(_)
        ));
        assert_eq!(policy().decide(&status(429), 4, &mut rng), RetryDecision::GiveUp);
    }

    #[test]
    fn test_server_error_uses_jitter_only() {
        let mut rng = rng();
        for code in [500, 502, 503, 504] {
            match policy().decide(&status(code), 2, &mut rng) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(15));
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }
        assert_eq!(policy().decide(&status(503), 4, &mut rng), RetryDecision::GiveUp);
    }

    #[test]
    fn test_network_errors_stop_at_network_cap() {
        let mut config = RetryConfig::default();
        config.max_attempts = 10;
        let policy = RetryPolicy::new(config);
        let mut rng = rng();
        let timeout = FetchOutcome::TransientFailure(TransientKind::Timeout);

        for attempt in 0..4 {
            assert!(matches!(
                policy.decide(&timeout, attempt, &mut rng),
                RetryDecision::Retry(_)
            ));
        }
        assert_eq!(policy.decide(&timeout, 4, &mut rng), RetryDecision::GiveUp);
    }

    #[test]
    fn test_network_delay_grows() {
        let policy = policy();
        let jitter = Duration::from_secs(2);
        assert_eq!(policy.network_delay(0, jitter), Duration::from_secs(3));
        assert_eq!(policy.network_delay(3, jitter), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_jitter_configuration() {
        let config = RetryConfig {
            backoff_unit_ms: 1,
            rate_limit_jitter_ms: DelayRange::ZERO,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::new(config);
        assert_eq!(
            policy.decide(&status(429), 2, &mut rng()),
            RetryDecision::Retry(Duration::from_millis(4))
        );
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let config = RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::new(config);
        assert_eq!(policy.decide(&status(429), 0, &mut rng()), RetryDecision::GiveUp);
    }
}
