// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Retry policy for guarded acquisition.
//!
//! A denied request is retried after a delay computed by
//! [`BackoffPolicy::delay_for`]. How the delay is spent is abstracted by
//! [`Sleeper`], so tests can count delays instead of waiting them out.
//! Acquisition can be abandoned through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

use std::time::Duration;

/// Delay schedule and attempt limit for retrying denied requests.
///
/// `delay(n) = clamp(initial × multiplierⁿ ± jitter, initial, max)`.
///
/// # Example
/// ```
/// use allocator::BackoffPolicy;
/// use std::time::Duration;
///
/// let p = BackoffPolicy::exponential(Duration::from_millis(10), Duration::from_millis(80));
/// assert_eq!(p.delay_for(0), Duration::from_millis(10));
/// assert_eq!(p.delay_for(2), Duration::from_millis(40));
/// assert_eq!(p.delay_for(10), Duration::from_millis(80));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first denial.
    pub initial_interval: Duration,
    /// Upper bound for any single delay.
    pub max_interval: Duration,
    /// Growth factor per attempt (`1.0` = fixed interval).
    pub multiplier: f64,
    /// Random spread as a fraction of the delay, in `[0.0, 1.0]`.
    pub jitter: f64,
    /// Give up after this many attempts (`None` = retry until granted).
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    /// Fixed half-second retry, unbounded attempts.
    fn default() -> Self {
        Self::fixed(Duration::from_millis(500))
    }
}

impl BackoffPolicy {
    /// Retries at a constant interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: None,
        }
    }

    /// Doubles the delay after every denial, up to `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_interval: initial,
            max_interval: max.max(initial),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts: None,
        }
    }

    /// Retries immediately. Useful in tests and for spin-style clients.
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Sets the jitter fraction, clamped to `[0.0, 1.0]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max.max(self.initial_interval);
        self
    }

    /// Returns `true` once `attempts` requests have been made and the
    /// limit forbids another.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay to wait after the `attempt`-th denial (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial_interval.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.min(i32::MAX as u32) as i32;
        let mut nanos =
            self.initial_interval.as_nanos() as f64 * self.multiplier.max(1.0).powi(exponent);

        if self.jitter > 0.0 {
            nanos += nanos * self.jitter * (rand::random::<f64>() - 0.5);
        }

        // The cast saturates, so an infinite product lands on the cap.
        let cap = self.max_interval.max(self.initial_interval);
        Duration::from_nanos(nanos.round() as u64)
            .max(self.initial_interval)
            .min(cap)
    }
}

/// Spends a backoff delay.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
