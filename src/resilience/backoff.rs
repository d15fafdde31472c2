//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Backoff delay before retry attempt `attempt` (1-based).
///
/// Doubles from `base_ms` per attempt, capped at `max_ms`, with up to 10%
/// additive jitter so concurrent retries spread out.
pub fn jittered_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let doubled = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = doubled.min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_until_cap() {
        let first = jittered_backoff(1, 100, 2_000);
        assert!(first.as_millis() >= 100 && first.as_millis() < 120);

        let second = jittered_backoff(2, 100, 2_000);
        assert!(second.as_millis() >= 200 && second.as_millis() < 230);

        let capped = jittered_backoff(12, 100, 1_000);
        assert!(capped.as_millis() >= 1_000 && capped.as_millis() < 1_110);
    }

    #[test]
    fn attempt_zero_is_immediate() {
        assert_eq!(jittered_backoff(0, 100, 1_000), Duration::ZERO);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let d = jittered_backoff(u32::MAX, 100, 5_000);
        assert!(d.as_millis() <= 5_500);
    }
}
