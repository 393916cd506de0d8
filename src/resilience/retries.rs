//! Retry policy for failed health queries.
//!
//! # Responsibilities
//! - Decide whether a watch keeps polling after a non-cancellation failure
//! - Compute the delay before the next attempt
//! - Bound the number of consecutive failures
//!
//! # Design Decisions
//! - Fail fast is the default: the first failure ends the watch
//! - Every failure reaches the consumer, retried or not
//! - A successful cycle resets the attempt counter

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// What a watch does after a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Surface the error and stop the watch.
    #[default]
    FailFast,
    /// Surface the error, wait, and poll again.
    Backoff {
        base_delay: Duration,
        max_delay: Duration,
        /// Consecutive failures before giving up; 0 means unlimited.
        max_attempts: u32,
    },
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// watch must stop.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::FailFast => None,
            RetryPolicy::Backoff {
                base_delay,
                max_delay,
                max_attempts,
            } => {
                if max_attempts > 0 && attempt >= max_attempts {
                    return None;
                }
                Some(calculate_backoff(
                    attempt,
                    base_delay.as_millis() as u64,
                    max_delay.as_millis() as u64,
                ))
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        if !config.enabled {
            return RetryPolicy::FailFast;
        }
        RetryPolicy::Backoff {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}
