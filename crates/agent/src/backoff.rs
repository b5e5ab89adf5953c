//! Rate-limit tracking for the posting endpoint.
//!
//! The tracker is a plain owned value inside the orchestration loop. Time is
//! read from `tokio::time`, so tests drive it with paused time.

use std::time::Duration;
use postclaw_config::BackoffConfig;
use tokio::time::Instant;
use tracing::debug;

/// Rate-limit bookkeeping.
///
/// `is_limited` implies `reset_at` is set. Once `reset_at` has passed the
/// limit is cleared on the next gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitState {
    pub is_limited: bool,
    pub reset_at: Option<Instant>,
    pub retry_count: u32,
    pub last_request_at: Option<Instant>,
}

/// What the gate would do right now, without suspending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Still inside a backoff window.
    Deny { wait_secs: u64 },
    /// Allowed, after waiting out the minimum spacing.
    Pace(Duration),
    /// Allowed immediately.
    Proceed,
}

/// Result of [`BackoffTracker::check_and_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { wait_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct BackoffTracker {
    state: RateLimitState,
    base_delay: Duration,
    max_delay: Duration,
    min_spacing: Duration,
}

impl BackoffTracker {
    pub fn new(base_delay: Duration, max_delay: Duration, min_spacing: Duration) -> Self {
        Self {
            state: RateLimitState::default(),
            base_delay,
            max_delay,
            min_spacing,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.min_spacing_ms),
        )
    }

    /// Decide whether a request may go out at `now`.
    ///
    /// An expired backoff window is cleared here, which is the only state
    /// change this method makes.
    pub fn gate(&mut self, now: Instant) -> Gate {
        if self.state.is_limited {
            match self.state.reset_at {
                Some(reset_at) if now < reset_at => {
                    let remaining = reset_at - now;
                    return Gate::Deny {
                        wait_secs: remaining.as_millis().div_ceil(1000) as u64,
                    };
                }
                _ => {
                    debug!(retry_count = self.state.retry_count, "Backoff window expired");
                    self.state.is_limited = false;
                    self.state.retry_count = 0;
                }
            }
        }

        match self.state.last_request_at {
            Some(last) => {
                let since = now.saturating_duration_since(last);
                if since < self.min_spacing {
                    Gate::Pace(self.min_spacing - since)
                } else {
                    Gate::Proceed
                }
            }
            None => Gate::Proceed,
        }
    }

    /// Gate a request, sleeping out the minimum spacing when needed.
    ///
    /// On `Allow` the request timestamp is stamped just before returning, so
    /// the caller should dispatch immediately.
    pub async fn check_and_wait(&mut self) -> Decision {
        match self.gate(Instant::now()) {
            Gate::Deny { wait_secs } => Decision::Deny { wait_secs },
            Gate::Pace(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "Pacing posting request");
                tokio::time::sleep(delay).await;
                self.state.last_request_at = Some(Instant::now());
                Decision::Allow
            }
            Gate::Proceed => {
                self.state.last_request_at = Some(Instant::now());
                Decision::Allow
            }
        }
    }

    pub fn record_success(&mut self) {
        self.record_success_at(Instant::now());
    }

    pub fn record_success_at(&mut self, now: Instant) {
        self.state.retry_count = 0;
        self.state.is_limited = false;
        self.state.last_request_at = Some(now);
    }

    /// Record a failed request. Only rate-limited failures touch the
    /// backoff fields.
    pub fn record_failure(&mut self, is_rate_limited: bool) {
        self.record_failure_at(is_rate_limited, None, Instant::now());
    }

    /// Record a failure with an optional server-provided `retry-after`.
    ///
    /// The window is the larger of the exponential delay and the hint,
    /// capped at `max_delay`.
    pub fn record_failure_at(&mut self, is_rate_limited: bool, retry_after: Option<Duration>, now: Instant) {
        if !is_rate_limited {
            return;
        }

        self.state.retry_count = self.state.retry_count.saturating_add(1);
        let delay = self
            .exponential_delay(self.state.retry_count)
            .max(retry_after.unwrap_or_default())
            .min(self.max_delay);

        self.state.is_limited = true;
        self.state.reset_at = Some(now + delay);
        debug!(
            retry_count = self.state.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Entering rate-limit backoff"
        );
    }

    /// `base * 2^retry_count`, capped at `max_delay`.
    fn exponential_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> RateLimitState {
        self.state
    }
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
