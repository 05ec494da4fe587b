// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry policy for opening and re-opening the live event stream.

use std::time::Duration;

/// Bounded retry policy for event stream connections.
///
/// The initial connection is attempted immediately; each retry waits
/// [`delay_for_attempt`](Self::delay_for_attempt) first. After a stream that
/// was already up fails, every attempt is a retry, so the first reconnect
/// also waits.
///
/// The default is a fixed 3 second delay and at most 5 attempts.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tango_rest_client::subscription::RetryPolicy;
///
/// let fixed = RetryPolicy::default();
/// assert_eq!(fixed.delay_for_attempt(4), Duration::from_secs(3));
///
/// let backoff = RetryPolicy::exponential(Duration::from_millis(500), Duration::from_secs(4))
///     .with_max_attempts(8);
/// assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(500));
/// assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(2));
/// assert_eq!(backoff.delay_for_attempt(6), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Upper bound for backed-off delays.
    pub max_delay: Duration,
    /// Factor applied to the delay after every retry; `1.0` keeps it fixed.
    pub backoff_multiplier: f32,
}

impl RetryPolicy {
    /// Default delay between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy with a constant delay between attempts.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_delay: delay,
            ..Self::default()
        }
    }

    /// Creates a policy doubling the delay after every retry, up to `max_delay`.
    #[must_use]
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay: initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the upper bound for backed-off delays.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay to wait before the `retry`-th retry (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry <= 1 || self.backoff_multiplier <= 1.0 {
            return self.delay;
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(retry - 1).unwrap_or(i32::MAX));

        // Delays are seconds or minutes, far from the f32 precision limit
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.delay.as_millis() as f32 * multiplier;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns `true` if another attempt may follow `attempts` failed ones.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
            max_delay: Self::DEFAULT_DELAY,
            backoff_multiplier: 1.0,
        }
    }
}
