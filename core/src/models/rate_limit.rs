//! Rate limit bucket: per-identity sliding minute window plus a daily quota
//! (C6). The reset/check/increment logic lives on this struct so
//! [`crate::ratelimit::RateLimiter`] stays a thin keyed-store wrapper that
//! owns only storage and dispatch.

use serde::{Deserialize, Serialize};

/// Outcome of [`RateLimitBucket::check_and_increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Denied; caller should wait `retry_after_ms` before retrying.
    Denied { retry_after_ms: i64 },
}

/// Per-identity counters for the minute window and the calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitBucket {
    window_start_ms: i64,
    requests_in_window: u32,
    day_key: String,
    requests_today: u32,
    minute_limit: u32,
    daily_limit: u32,
}

impl RateLimitBucket {
    pub fn new(minute_limit: u32, daily_limit: u32, now_ms: i64, day_key: String) -> Self {
        Self {
            window_start_ms: now_ms,
            requests_in_window: 0,
            day_key,
            requests_today: 0,
            minute_limit,
            daily_limit,
        }
    }

    pub fn window_start_ms(&self) -> i64 {
        self.window_start_ms
    }

    pub fn requests_in_window(&self) -> u32 {
        self.requests_in_window
    }

    pub fn requests_today(&self) -> u32 {
        self.requests_today
    }

    pub fn day_key(&self) -> &str {
        &self.day_key
    }

    pub fn minute_limit(&self) -> u32 {
        self.minute_limit
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Reset expired windows, then admit or deny.
    ///
    /// # Example
    /// ```
    /// use a2a_fabric_core::models::rate_limit::{RateLimitBucket, RateLimitDecision};
    ///
    /// let mut bucket = RateLimitBucket::new(2, 100, 0, "2026-01-01".into());
    /// assert_eq!(bucket.check_and_increment(0, "2026-01-01"), RateLimitDecision::Allowed);
    /// assert_eq!(bucket.check_and_increment(0, "2026-01-01"), RateLimitDecision::Allowed);
    /// assert!(matches!(
    ///     bucket.check_and_increment(0, "2026-01-01"),
    ///     RateLimitDecision::Denied { .. }
    /// ));
    /// ```
    pub fn check_and_increment(&mut self, now_ms: i64, today: &str) -> RateLimitDecision {
        const WINDOW_MS: i64 = 60_000;

        if now_ms - self.window_start_ms >= WINDOW_MS {
            self.window_start_ms = now_ms;
            self.requests_in_window = 0;
        }
        if today != self.day_key {
            self.day_key = today.to_string();
            self.requests_today = 0;
        }

        if self.requests_in_window >= self.minute_limit || self.requests_today >= self.daily_limit {
            let retry_after_ms = (self.window_start_ms + WINDOW_MS - now_ms).max(0);
            return RateLimitDecision::Denied { retry_after_ms };
        }

        self.requests_in_window += 1;
        self.requests_today += 1;
        RateLimitDecision::Allowed
    }
}
