//! Retry delay policies.

use std::time::Duration;

/// How long to wait before the next attempt of a failed job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffPolicy {
    /// Same delay every time.
    Fixed { delay: Duration },
    /// `base * 2^(attempt-1)`, capped at `max`, with up to `jitter` of the
    /// delay added at random.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: f64,
    },
}

const MIN_DELAY: Duration = Duration::from_secs(1);

impl BackoffPolicy {
    /// Delay before retrying after `attempt` failed attempts (1-based).
    ///
    /// Never zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match *self {
            BackoffPolicy::Fixed { delay } => delay,
            BackoffPolicy::Exponential { base, max, jitter } => {
                let exp = attempt.saturating_sub(1).min(20);
                let raw = base.saturating_mul(1u32 << exp).min(max);
                let jitter = jitter.clamp(0.0, 1.0);
                raw + raw.mul_f64(jitter * fastrand::f64())
            }
        };
        delay.max(MIN_DELAY)
    }

    /// Delay honoring a provider's retry-after when it asks for longer.
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay(attempt);
        match retry_after {
            Some(hint) if hint > delay => hint,
            _ => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential() -> BackoffPolicy {
        BackoffPolicy::Exponential {
            base: Duration::from_secs(10),
            max: Duration::from_secs(600),
            jitter: 0.25,
        }
    }

    #[test]
    fn fixed_delay_does_not_grow() {
        let policy = BackoffPolicy::Fixed {
            delay: Duration::from_secs(120),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(120));
        assert_eq!(policy.delay(5), Duration::from_secs(120));
    }

    #[test]
    fn exponential_delay_doubles_within_jitter() {
        let policy = exponential();
        for (attempt, base_secs) in [(1u32, 10u64), (2, 20), (3, 40), (4, 80)] {
            let delay = policy.delay(attempt);
            assert!(delay >= Duration::from_secs(base_secs), "attempt {attempt}: {delay:?}");
            assert!(delay <= Duration::from_secs_f64(base_secs as f64 * 1.25));
        }
    }

    #[test]
    fn exponential_delay_is_capped() {
        let policy = exponential();
        let delay = policy.delay(30);
        assert!(delay >= Duration::from_secs(600));
        assert!(delay <= Duration::from_secs(750));
    }

    #[test]
    fn delay_is_never_zero() {
        let fixed = BackoffPolicy::Fixed {
            delay: Duration::ZERO,
        };
        let exp = BackoffPolicy::Exponential {
            base: Duration::ZERO,
            max: Duration::ZERO,
            jitter: 0.0,
        };
        assert!(fixed.delay(1) > Duration::ZERO);
        assert!(exp.delay(1) > Duration::ZERO);
    }

    #[test]
    fn longer_retry_after_wins() {
        let policy = BackoffPolicy::Fixed {
            delay: Duration::from_secs(30),
        };
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(300))),
            Duration::from_secs(300)
        );
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(5))),
            Duration::from_secs(30)
        );
        assert_eq!(policy.delay_with_hint(1, None), Duration::from_secs(30));
    }
}
