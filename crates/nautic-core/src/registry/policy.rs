//! What happens after a capability fails to initialize.

use std::time::Duration;

/// Default first retry delay.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Default cap on the retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Failure policy for a capability slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// A failed slot stays unavailable for the rest of the process lifetime.
    Sticky,

    /// Retry after an exponential backoff. While the backoff window is open,
    /// callers get the cached failure. A zero initial backoff retries on
    /// every call.
    Retry {
        initial_backoff: Duration,
        max_backoff: Duration,
    },
}

impl FailurePolicy {
    /// Retry on each call after a failure.
    pub fn retry_every_call() -> Self {
        FailurePolicy::Retry {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Retry with exponential backoff between the given bounds.
    pub fn retry_with_backoff(initial_backoff: Duration, max_backoff: Duration) -> Self {
        FailurePolicy::Retry {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// `None` means never retry.
    pub fn backoff_after(&self, failures: u32) -> Option<Duration> {
        match *self {
            FailurePolicy::Sticky => None,
            FailurePolicy::Retry {
                initial_backoff,
                max_backoff,
            } => {
                let factor = 1u32
                    .checked_shl(failures.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                Some(initial_backoff.saturating_mul(factor).min(max_backoff))
            }
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Retry {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}
