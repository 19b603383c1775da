// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

/// Delay schedule between attempts: `initial_delay * multiplier^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        multiplier: 2.0,
    };

    /// No waiting between attempts.
    pub const IMMEDIATE: RetryPolicy = RetryPolicy {
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 2.0,
    };

    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            ..RetryPolicy::DEFAULT
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u64) -> Duration {
        // Growth beyond the cap is irrelevant, and keeping the exponent small avoids f64 overflow.
        let exponent = i32::try_from(retry.min(64)).unwrap_or(64);
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // past Duration's range (2^64 s) only the cap is meaningful
        Duration::try_from_secs_f64(delay).map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::DEFAULT
    }
}
