//! Rate Limiter (C6).
//!
//! Per-identity sliding minute window plus a daily quota, guarding every
//! mutating endpoint a front-end would expose. Identity here is whatever
//! string the caller authenticated as — an API key's agent id, or an IP
//! for unauthenticated endpoints; the limiter itself is identity-agnostic.

use crate::core::error::CoreError;
use crate::core::time::Clock;
use crate::models::rate_limit::{RateLimitBucket, RateLimitDecision};
use crate::persistence::EntityStore;

/// Default limits for ordinary identities.
pub const DEFAULT_MINUTE_LIMIT: u32 = 20;
pub const DEFAULT_DAILY_LIMIT: u32 = 1000;

/// Owns one [`RateLimitBucket`] per identity.
pub struct RateLimiter {
    buckets: EntityStore<RateLimitBucket>,
    minute_limit: u32,
    daily_limit: u32,
}

impl RateLimiter {
    pub fn new(minute_limit: u32, daily_limit: u32) -> Self {
        Self {
            buckets: EntityStore::new(),
            minute_limit,
            daily_limit,
        }
    }

    /// A limiter using the fabric's ordinary per-key defaults.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MINUTE_LIMIT, DEFAULT_DAILY_LIMIT)
    }

    /// Check and, if allowed, increment the bucket for `identity`. Lazily
    /// creates the bucket on first use. Returns `RateLimited` with a
    /// `Retry-After` bound by 60s on denial.
    pub fn check_and_increment(&self, clock: &dyn Clock, identity: &str) -> Result<(), CoreError> {
        let now_ms = clock.now_ms();
        let today = clock.today_utc();

        if !self.buckets.contains(identity) {
            self.buckets.insert(
                identity,
                RateLimitBucket::new(self.minute_limit, self.daily_limit, now_ms, today.clone()),
            );
        }

        let decision = self
            .buckets
            .with_mut(identity, |bucket| bucket.check_and_increment(now_ms, &today))
            .expect("bucket was just inserted");

        match decision {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Denied { retry_after_ms } => {
                Err(CoreError::RateLimited { retry_after_ms })
            }
        }
    }

    /// Current counters for `identity`, if it has made at least one request.
    pub fn snapshot(&self, identity: &str) -> Option<RateLimitBucket> {
        self.buckets.snapshot(identity)
    }
}
