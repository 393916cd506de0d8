//! Exponential backoff with jitter between failed health queries.

use std::time::Duration;

use rand::Rng;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped at
/// `max_ms`, plus up to 10% jitter. Attempt 0 means no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let first = calculate_backoff(1, 100, 2000).as_millis();
        assert!((100..110).contains(&first));

        let third = calculate_backoff(3, 100, 2000).as_millis();
        assert!((400..440).contains(&third));

        let capped = calculate_backoff(64, 100, 2000).as_millis();
        assert!((2000..2200).contains(&capped));
    }

    #[test]
    fn test_backoff_saturates_on_huge_delays() {
        let delay = calculate_backoff(1, u64::MAX, u64::MAX);
        assert_eq!(delay, Duration::from_millis(u64::MAX));

        let late = calculate_backoff(u32::MAX, u64::MAX / 2, u64::MAX);
        assert!(late >= Duration::from_millis(u64::MAX / 2));
    }
}
